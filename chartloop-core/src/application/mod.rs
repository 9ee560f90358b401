pub mod cancel;
pub mod evaluator;
pub mod extract;
pub mod orchestrator;
pub mod plateau;
pub mod structure;
pub mod synthesizer;
