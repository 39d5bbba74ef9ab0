pub mod corpus;
pub mod probe;
pub mod runner;
pub mod types;

pub use corpus::{load_corpus, write_lines};
pub use probe::{PayloadProbe, DEFAULT_PROBE_TIMEOUT, PROBE_FAILURE_STATUS};
pub use runner::{calculate_results, worker_count, ParallelProbeRunner, ProbeResults, ResultStats};
pub use types::{BodyEncoding, HttpMethod, Payload, Position, ProbeTarget};
