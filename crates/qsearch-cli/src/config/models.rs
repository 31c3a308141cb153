use qsearch::engine::config as core_config;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub optimizer: OptimizerCommand,
    pub core_config: core_config::SweepConfig,
}
