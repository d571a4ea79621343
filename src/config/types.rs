//! Configuration file layout

use serde::{Deserialize, Serialize};

use crate::cache::{Redis, RedisOpts};
use crate::context::CallContext;
use crate::miniprogram::MiniProgramConfig;
use crate::ssh::OverSsh;

pub const CONFIG_VERSION: u32 = 1;

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Root of `config.json`. Every section is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisOpts>,

    /// Gateway the Redis connection is tunneled through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over_ssh: Option<OverSsh>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mini_program: Option<MiniProgramConfig>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            redis: None,
            over_ssh: None,
            mini_program: None,
        }
    }
}

impl SdkConfig {
    /// Redis cache for the `redis` section, tunneled when `over_ssh` is set
    pub fn redis_cache(&self, ctx: CallContext) -> Option<Redis> {
        let opts = self.redis.as_ref()?;
        Some(match &self.over_ssh {
            Some(over_ssh) => Redis::new_over_ssh(ctx, opts, over_ssh),
            None => Redis::new(ctx, opts),
        })
    }
}
