//! Built-in prompt templates. Placeholders use `{{NAME}}` and are filled by
//! [`super::loader::PromptLoader::interpolate`].

pub const CREATE_SYSTEM: &str = "You write ModSecurity rules for a web application firewall. \
You think about which part of an attack string is essential to the attack and which parts are \
incidental, and you produce detection logic that keys on the essential part.";

pub const CREATE_REGEX: &str = "Write a regular expression that detects the following attack payload \
and close variants of it. Respond with the regular expression only, without delimiters, flags or \
explanation.

{{PAYLOAD}}";

pub const CREATE_REGEX_RETRY: &str = "That regular expression does not match the payload. \
Write a corrected one. Respond with the regular expression only.";

pub const CREATE_RULE: &str = "The payload arrives in the {{POSITION}} of a {{METHOD}} request. \
Turn the regular expression into a single-line ModSecurity SecRule that denies the request. \
Use {{ID}} as the rule id. Respond with the rule only.";

pub const AGGREGATE_SYSTEM: &str = "You consolidate ModSecurity rules. Group rules that detect the \
same kind of attack, merge each group into as few rules as possible, and keep every merged rule \
specific enough that legitimate traffic is not blocked.";

pub const AGGREGATE: &str = "Consolidate these ModSecurity rules into fewer rules. Do not collapse \
everything into a single rule. Every resulting rule must only deny.

# Rules
{{RULES}}

None of the following legitimate requests may be matched by your rules.

# Allowed traffic
{{TRAFFIC}}

Respond with the rules only, one rule per line, and nothing else.";

pub const CLASSIFY_SYSTEM: &str = "You triage web server access logs. For a log entry, decide whether \
it carries an attack, isolate the attacking part of the request, and classify it as one of: \
command-injection, file-inclusion, sqli, xss, directory-traversal, recon, non-malicious.

Answer with a JSON object of the form
{\"classification\": \"<category>\", \"extracted_payload\": \"<attack string>\", \"reason\": \"<short explanation>\"}";

pub const CLASSIFY: &str = "Classify this log entry. Respond with the JSON object only.

{{LOG}}";
