mod common;

use std::time::Duration;

use common::*;
use wafsmith::errors::WafsmithError;
use wafsmith::pipeline::{run_assessment, AssessmentConfig, TrafficStatus};

async fn setup(rule: &str, evaded_output: Option<std::path::PathBuf>) -> (AssessmentConfig, MockEnvironment, std::sync::Arc<std::sync::Mutex<Vec<EnvCall>>>) {
    let active = ActiveRule::default();
    active.install(rule);
    let target = spawn_fake_waf(active.clone()).await;
    let (env, calls) = MockEnvironment::new(active);
    let config = AssessmentConfig {
        target,
        threads: 4,
        probe_timeout: Duration::from_secs(2),
        allowed_status: 200,
        evaded_output,
    };
    (config, env, calls)
}

#[tokio::test]
async fn test_reports_evaded_payloads_and_traffic_status() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("evaded.txt");
    let (config, env, calls) = setup("select", Some(out.clone())).await;
    let attacks = strings(&["1 union select", "<script>", "../etc/passwd"]);

    let report = run_assessment(&config, Box::new(env), &attacks, &strings(&["hello"]), None)
        .await
        .unwrap();

    assert_eq!(report.evaded, strings(&["<script>", "../etc/passwd"]));
    assert_eq!(report.attack_stats.matched, 2);
    assert_eq!(report.attack_stats.total, 3);
    assert_eq!(report.traffic_status, TrafficStatus::Passed);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "<script>\n../etc/passwd\n");
    assert_eq!(*calls.lock().unwrap(), vec![EnvCall::Setup, EnvCall::Teardown]);
}

#[tokio::test]
async fn test_blocked_traffic_fails_and_missing_traffic_is_untested() {
    let (config, env, _calls) = setup("hello", None).await;
    let report = run_assessment(&config, Box::new(env), &strings(&["x"]), &strings(&["hello"]), None)
        .await
        .unwrap();
    assert_eq!(report.traffic_status, TrafficStatus::Failed);

    let (config, env, _calls) = setup("hello", None).await;
    let report = run_assessment(&config, Box::new(env), &strings(&["x"]), &[], None)
        .await
        .unwrap();
    assert_eq!(report.traffic_status, TrafficStatus::YetToTest);
}

#[tokio::test]
async fn test_failed_setup_still_tears_down() {
    let (config, env, calls) = setup("x", None).await;
    let err = run_assessment(&config, Box::new(env.failing_setup()), &strings(&["x"]), &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, WafsmithError::Environment(_)));
    assert_eq!(*calls.lock().unwrap(), vec![EnvCall::Setup, EnvCall::Teardown]);
}
