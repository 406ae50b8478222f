use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use batchr::BatchrError;
use batchr::composer::ComposerConfig;
use batchr::daemon::{TargetPlan, TickConfig};
use batchr::domain::{HackMode, Multipliers, TargetState};
use batchr::scheduler::TimingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub timing: TimingConfig,
    pub composer: ComposerConfig,
    pub multipliers: Multipliers,
    pub player: PlayerConfig,
    pub agents: Vec<AgentConfig>,
    pub targets: Vec<TargetConfig>,
    pub daemon: TickConfig,
    pub snapshots: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Hacking skill used by `plan` and as the simulation's starting skill
    pub skill: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self { skill: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub hostname: String,
    pub threads: u32,
    #[serde(default = "default_cores")]
    pub cores: u32,
}

fn default_cores() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub hostname: String,
    /// normal, xp-farm, stock-long, stock-short, stock-neutral, share
    pub mode: String,
    /// Agent running this target's legs (defaults to the first agent)
    pub agent: Option<String>,
    pub money: f64,
    pub max_money: f64,
    pub security: f64,
    pub min_security: f64,
    pub required_skill: u32,
    pub growth: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            hostname: "n00dles".to_string(),
            mode: "normal".to_string(),
            agent: None,
            money: 70_000.0,
            max_money: 1_750_000.0,
            security: 1.0,
            min_security: 1.0,
            required_skill: 1,
            growth: 3000.0,
        }
    }
}

impl TargetConfig {
    pub fn hack_mode(&self) -> std::result::Result<HackMode, BatchrError> {
        self.mode
            .parse()
            .map_err(|e: String| BatchrError::Config(format!("target {}: {}", self.hostname, e)))
    }

    /// Initial state for the simulated world and `plan`
    pub fn to_target_state(&self) -> TargetState {
        TargetState {
            hostname: self.hostname.clone(),
            money: self.money,
            max_money: self.max_money,
            security: self.security,
            min_security: self.min_security,
            required_skill: self.required_skill,
            growth: self.growth,
            captured_at: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Directory for the JSONL snapshot log (None = keep snapshots in memory)
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            timing: TimingConfig::default(),
            composer: ComposerConfig::default(),
            multipliers: Multipliers::default(),
            player: PlayerConfig::default(),
            agents: vec![AgentConfig {
                hostname: "home".to_string(),
                threads: 256,
                cores: 1,
            }],
            targets: vec![TargetConfig::default()],
            daemon: TickConfig::default(),
            snapshots: SnapshotConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. ./batchr.yml
    /// 3. ~/.config/batchr/batchr.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try project config: ./<project>.yml
        let project_config = PathBuf::from(format!("{}.yml", project_name));
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", project_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject configurations the scheduler cannot run with
    pub fn validate(&self) -> std::result::Result<(), BatchrError> {
        if self.agents.is_empty() {
            return Err(BatchrError::Config(
                "no execution agents configured; add at least one entry under `agents`".to_string(),
            ));
        }
        for agent in &self.agents {
            if agent.hostname.is_empty() {
                return Err(BatchrError::Config("agent with empty hostname".to_string()));
            }
            if agent.cores == 0 {
                return Err(BatchrError::Config(format!("agent {} has zero cores", agent.hostname)));
            }
        }

        let c = &self.composer;
        let in_range = |f: f64| f > 0.0 && f <= 1.0;
        if !in_range(c.min_hack_fraction) || !in_range(c.max_hack_fraction) || c.min_hack_fraction > c.max_hack_fraction {
            return Err(BatchrError::Config(format!(
                "hack fraction bounds must satisfy 0 < min <= max <= 1 (min {}, max {})",
                c.min_hack_fraction, c.max_hack_fraction
            )));
        }
        if !in_range(c.hack_fraction) {
            return Err(BatchrError::Config(format!(
                "hack-fraction {} must be in (0, 1]",
                c.hack_fraction
            )));
        }

        if self.daemon.tick_interval_ms == 0 {
            return Err(BatchrError::Config("tick-interval-ms must be positive".to_string()));
        }

        for target in &self.targets {
            target.hack_mode()?;
            if let Some(agent) = &target.agent {
                if self.agent(agent).is_none() {
                    return Err(BatchrError::Config(format!(
                        "target {} uses unknown agent {}",
                        target.hostname, agent
                    )));
                }
            }
            if target.max_money < 0.0 || target.min_security < 0.0 {
                return Err(BatchrError::Config(format!("target {} has negative limits", target.hostname)));
            }
        }
        Ok(())
    }

    pub fn agent(&self, hostname: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.hostname == hostname)
    }

    pub fn target(&self, hostname: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.hostname == hostname)
    }

    /// Loop plans for every configured target
    pub fn target_plans(&self) -> std::result::Result<Vec<TargetPlan>, BatchrError> {
        let default_agent = self
            .agents
            .first()
            .map(|a| a.hostname.clone())
            .ok_or_else(|| BatchrError::Config("no execution agents configured".to_string()))?;

        self.targets
            .iter()
            .map(|t| {
                let agent = t.agent.clone().unwrap_or_else(|| default_agent.clone());
                Ok(TargetPlan::new(&t.hostname, t.hack_mode()?, &agent))
            })
            .collect()
    }
}
