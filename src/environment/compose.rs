use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use crate::errors::WafsmithError;
use crate::utils::truncation::truncate_error;
use super::artifact::{artifact_name, is_generated_artifact, RuleHandle};
use super::{Deployment, EnvState, TestEnvironment};
use tracing::{debug, info, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);
/// `id` prints the identity for uid, gid and groups.
const MIN_IDENTITY_MATCHES: usize = 3;

#[derive(Debug, Clone)]
pub struct ComposeSettings {
    /// Directory holding the compose file and the rules directory.
    pub setup_dir: PathBuf,
    pub compose_file: String,
    pub waf_service: String,
    /// User the WAF process runs as once healthy.
    pub waf_identity: String,
    pub rules_subdir: String,
    pub artifact_prefix: String,
    pub artifact_extension: String,
    pub docker_bin: PathBuf,
    /// Pause after every compose command.
    pub settle_delay: Duration,
    /// Pause after the stack first comes up.
    pub startup_delay: Duration,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            setup_dir: PathBuf::from("."),
            compose_file: "docker-compose.yml".to_string(),
            waf_service: "crs-nginx".to_string(),
            waf_identity: "nginx".to_string(),
            rules_subdir: "rules".to_string(),
            artifact_prefix: "lwrc".to_string(),
            artifact_extension: ".conf".to_string(),
            docker_bin: PathBuf::from("docker"),
            settle_delay: Duration::from_millis(1500),
            startup_delay: Duration::from_secs(2),
        }
    }
}

/// [`TestEnvironment`] backed by `docker compose`.
pub struct ComposeEnvironment {
    settings: ComposeSettings,
    identity_re: Regex,
    state: EnvState,
}

impl ComposeEnvironment {
    pub fn new(settings: ComposeSettings) -> Result<Self, WafsmithError> {
        let identity_re = Regex::new(&format!(r"\({}\)", regex::escape(&settings.waf_identity)))
            .map_err(|e| WafsmithError::Config(format!("Invalid WAF identity: {}", e)))?;
        Ok(Self {
            settings,
            identity_re,
            state: EnvState::Down,
        })
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.settings.setup_dir.join(&self.settings.rules_subdir)
    }

    async fn compose(&self, args: &[&str]) -> Result<String, WafsmithError> {
        let s = &self.settings;
        debug!(docker = %s.docker_bin.display(), args = %args.join(" "), "Running docker compose");

        let mut command = Command::new(&s.docker_bin);
        command
            .arg("compose")
            .arg("-f")
            .arg(&s.compose_file)
            .args(args)
            .current_dir(&s.setup_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(COMMAND_TIMEOUT, command.output())
            .await
            .map_err(|_| WafsmithError::Timeout(format!(
                "docker compose {} did not finish within {}s",
                args.join(" "),
                COMMAND_TIMEOUT.as_secs()
            )))?
            .map_err(|e| WafsmithError::Environment(format!(
                "Failed to run {}: {}",
                s.docker_bin.display(),
                e
            )))?;

        // The container runtime needs a moment before the next command.
        if !s.settle_delay.is_zero() {
            tokio::time::sleep(s.settle_delay).await;
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WafsmithError::Environment(format!(
                "docker compose {} failed ({}): {}",
                args.join(" "),
                output.status,
                truncate_error(stderr.trim())
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Delete rule files left behind by an interrupted run.
    async fn purge_stale_artifacts(&self) -> Result<usize, WafsmithError> {
        let dir = self.rules_dir();
        if !dir.is_dir() {
            tokio::fs::create_dir_all(&dir).await?;
            return Ok(0);
        }
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_generated_artifact(&path, &self.settings.artifact_prefix, &self.settings.artifact_extension) {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn write_artifact(&self, rule: &str) -> Result<RuleHandle, WafsmithError> {
        let name = artifact_name(&self.settings.artifact_prefix, rule, &self.settings.artifact_extension);
        let path = self.rules_dir().join(name);
        tokio::fs::write(&path, rule).await.map_err(|e| {
            WafsmithError::Environment(format!("Failed to write rule file {}: {}", path.display(), e))
        })?;
        Ok(RuleHandle { path, rule: rule.to_string() })
    }

    fn identity_matches(&self, output: &str) -> bool {
        self.identity_re.find_iter(output).count() >= MIN_IDENTITY_MATCHES
    }

    pub fn setup_dir(&self) -> &Path {
        &self.settings.setup_dir
    }
}

#[async_trait]
impl TestEnvironment for ComposeEnvironment {
    async fn setup(&mut self) -> Result<(), WafsmithError> {
        let removed = self.purge_stale_artifacts().await?;
        if removed > 0 {
            info!(removed, "Removed stale rule files");
        }

        // Best effort: a stack left running by an interrupted run.
        if let Err(e) = self.compose(&["down"]).await {
            debug!(error = %e, "No leftover stack to bring down");
        }

        // A failed `up` can still leave containers running, so teardown must run.
        self.state = EnvState::Up;
        self.compose(&["up", "-d"]).await?;
        if !self.settings.startup_delay.is_zero() {
            tokio::time::sleep(self.settings.startup_delay).await;
        }
        info!(dir = %self.settings.setup_dir.display(), "Test environment up");
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), WafsmithError> {
        if self.state == EnvState::Down {
            return Ok(());
        }
        self.state = EnvState::Down;
        self.compose(&["down"]).await?;
        info!("Test environment down");
        Ok(())
    }

    async fn deploy_rule(&mut self, rule: &str) -> Result<Deployment, WafsmithError> {
        let handle = self.write_artifact(rule).await?;
        if self.restart_waf().await {
            debug!(path = %handle.path.display(), "Rule deployed");
            return Ok(Deployment::Healthy(handle));
        }

        warn!(path = %handle.path.display(), "WAF unhealthy after deploying rule, restoring baseline");
        if !self.remove_rule(&handle).await {
            return Err(WafsmithError::Environment(format!(
                "Could not remove rejected rule file {}",
                handle.path.display()
            )));
        }
        if !self.restart_waf().await {
            return Err(WafsmithError::Environment("WAF did not recover after removing rejected rule".into()));
        }
        Ok(Deployment::Unhealthy)
    }

    async fn remove_rule(&mut self, handle: &RuleHandle) -> bool {
        match tokio::fs::remove_file(&handle.path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %handle.path.display(), error = %e, "Failed to delete rule file");
                false
            }
        }
    }

    async fn restart_waf(&mut self) -> bool {
        let service = self.settings.waf_service.clone();
        if let Err(e) = self.compose(&["restart", service.as_str()]).await {
            warn!(service = %service, error = %e, "WAF restart failed");
            return false;
        }
        self.health_check().await
    }

    async fn health_check(&mut self) -> bool {
        let service = self.settings.waf_service.clone();
        match self.compose(&["exec", "-T", service.as_str(), "id"]).await {
            Ok(output) => {
                let healthy = self.identity_matches(&output);
                debug!(service = %service, healthy, "WAF health check");
                healthy
            }
            Err(e) => {
                debug!(service = %service, error = %e, "WAF health check failed");
                false
            }
        }
    }

    fn state(&self) -> EnvState {
        self.state
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in `docker` that logs its arguments and reports the WAF
    /// unhealthy whenever a deployed rule contains BROKEN.
    fn fake_docker(dir: &Path) -> (PathBuf, PathBuf) {
        let log = dir.join("docker.log");
        let rules = dir.join("rules");
        let script = dir.join("docker");
        let body = format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{log}'\n\
             case \"$*\" in\n\
               *\" exec \"*)\n\
                 if grep -qs BROKEN '{rules}'/*.conf; then exit 1; fi\n\
                 echo 'uid=101(nginx) gid=101(nginx) groups=101(nginx)'\n\
                 ;;\n\
               *\" up \"*) if [ -f '{dir}/fail-up' ]; then echo boom >&2; exit 1; fi ;;\n\
               *\" down\") if [ -f '{dir}/fail-down' ]; then echo 'no such stack' >&2; exit 1; fi ;;\n\
             esac\n\
             exit 0\n",
            log = log.display(),
            rules = rules.display(),
            dir = dir.display(),
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    fn environment(dir: &Path) -> (ComposeEnvironment, PathBuf) {
        let (docker_bin, log) = fake_docker(dir);
        let settings = ComposeSettings {
            setup_dir: dir.to_path_buf(),
            docker_bin,
            settle_delay: Duration::ZERO,
            startup_delay: Duration::ZERO,
            ..Default::default()
        };
        (ComposeEnvironment::new(settings).unwrap(), log)
    }

    fn commands(log: &Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_setup_purges_stale_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("rules")).unwrap();
        std::fs::write(dir.path().join("rules/lwrc-deadbeef.conf"), "old").unwrap();
        std::fs::write(dir.path().join("rules/REQUEST-900.conf"), "crs").unwrap();

        let (mut env, log) = environment(dir.path());
        env.setup().await.unwrap();

        assert_eq!(env.state(), EnvState::Up);
        assert!(!dir.path().join("rules/lwrc-deadbeef.conf").exists());
        assert!(dir.path().join("rules/REQUEST-900.conf").exists());
        assert_eq!(
            commands(&log),
            vec!["compose -f docker-compose.yml down", "compose -f docker-compose.yml up -d"]
        );
    }

    #[tokio::test]
    async fn test_setup_survives_missing_leftover_stack() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fail-down"), "").unwrap();
        let (mut env, log) = environment(dir.path());

        env.setup().await.unwrap();
        assert_eq!(env.state(), EnvState::Up);
        assert_eq!(commands(&log).last().map(String::as_str), Some("compose -f docker-compose.yml up -d"));
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut env, log) = environment(dir.path());

        env.teardown().await.unwrap();
        env.setup().await.unwrap();
        env.teardown().await.unwrap();
        env.teardown().await.unwrap();

        assert_eq!(env.state(), EnvState::Down);
        let cmds = commands(&log);
        let up = cmds.iter().position(|c| c.ends_with(" up -d")).unwrap();
        let downs = cmds[up..].iter().filter(|c| c.ends_with(" down")).count();
        assert_eq!(downs, 1);
    }

    #[tokio::test]
    async fn test_failed_up_still_needs_teardown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fail-up"), "").unwrap();
        let (mut env, _log) = environment(dir.path());

        let err = env.setup().await.unwrap_err();
        assert!(matches!(err, WafsmithError::Environment(_)));
        assert_eq!(env.state(), EnvState::Up);
        env.teardown().await.unwrap();
        assert_eq!(env.state(), EnvState::Down);
    }

    #[tokio::test]
    async fn test_deploy_healthy_rule_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let (mut env, log) = environment(dir.path());
        env.setup().await.unwrap();

        let rule = "SecRule ARGS \"@rx select\" \"id:1,deny\"";
        let handle = match env.deploy_rule(rule).await.unwrap() {
            Deployment::Healthy(handle) => handle,
            Deployment::Unhealthy => panic!("rule should deploy"),
        };
        assert_eq!(std::fs::read_to_string(&handle.path).unwrap(), rule);
        assert_eq!(
            handle.path.file_name().unwrap().to_str().unwrap(),
            artifact_name("lwrc", rule, ".conf")
        );

        assert!(env.remove_rule(&handle).await);
        assert!(!handle.path.exists());
        assert!(!env.remove_rule(&handle).await);

        let cmds = commands(&log);
        assert!(cmds.contains(&"compose -f docker-compose.yml restart crs-nginx".to_string()));
        assert!(cmds.contains(&"compose -f docker-compose.yml exec -T crs-nginx id".to_string()));
    }

    #[tokio::test]
    async fn test_unhealthy_rule_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let (mut env, log) = environment(dir.path());
        env.setup().await.unwrap();

        let outcome = env.deploy_rule("SecRule BROKEN").await.unwrap();
        assert_eq!(outcome, Deployment::Unhealthy);

        let leftovers: Vec<_> = std::fs::read_dir(env.rules_dir()).unwrap().collect();
        assert!(leftovers.is_empty());
        let restarts = commands(&log).iter().filter(|c| c.contains(" restart ")).count();
        assert_eq!(restarts, 2);
        assert!(env.health_check().await);
    }

    #[test]
    fn test_identity_needs_three_matches() {
        let env = ComposeEnvironment::new(ComposeSettings::default()).unwrap();
        assert!(env.identity_matches("uid=101(nginx) gid=101(nginx) groups=101(nginx)"));
        assert!(!env.identity_matches("uid=0(root) gid=0(root) groups=0(root),101(nginx)"));
    }
}
