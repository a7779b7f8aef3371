//! TCK tests for durable-sdk
//!
//! Replays the captured histories in `tests/tck/corpus/` and checks that the
//! reference workflows reach the recorded outcome, or report the expected
//! determinism violation.

mod replay_corpus;
