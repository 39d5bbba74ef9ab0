use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "llm": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string", "enum": ["openai", "local", "openai_compatible"] },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "base_url": { "type": "string" },
                    "max_retries": { "type": "integer", "minimum": 0 },
                    "regex_attempts": { "type": "integer", "minimum": 1 },
                    "prompts_dir": { "type": "string" }
                }
            },
            "environment": {
                "type": "object",
                "properties": {
                    "setup_dir": { "type": "string" },
                    "compose_file": { "type": "string" },
                    "waf_service": { "type": "string" },
                    "waf_identity": { "type": "string" },
                    "rules_dir": { "type": "string" },
                    "artifact_prefix": { "type": "string", "minLength": 1 },
                    "artifact_extension": { "type": "string" },
                    "docker_bin": { "type": "string" },
                    "settle_delay_ms": { "type": "integer", "minimum": 0 },
                    "startup_delay_ms": { "type": "integer", "minimum": 0 }
                }
            },
            "target": {
                "type": "object",
                "properties": {
                    "endpoint": { "type": "string", "format": "uri" },
                    "method": { "type": "string", "enum": ["GET", "POST", "PUT", "DELETE"] },
                    "position": {
                        "type": "string",
                        "enum": ["url_parameters", "http_header", "http_body"]
                    },
                    "body_encoding": { "type": "string", "enum": ["form", "json", "xml"] },
                    "header_name": { "type": "string" }
                }
            },
            "probe": {
                "type": "object",
                "properties": {
                    "threads": { "type": "integer", "minimum": 1 },
                    "timeout_secs": { "type": "integer", "minimum": 1 },
                    "blocked_status": { "type": "integer", "minimum": 100, "maximum": 599 },
                    "allowed_status": { "type": "integer", "minimum": 100, "maximum": 599 }
                }
            },
            "output": {
                "type": "object",
                "properties": {
                    "rules_file": { "type": "string" },
                    "evaded_file": { "type": "string" },
                    "payloads_file": { "type": "string" }
                }
            }
        }
    })
});
