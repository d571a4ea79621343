//! Mini-program API
//!
//! ```ignore
//! let ctx = MiniProgramContext::with_default_http(config, token_provider)?;
//! let mp = MiniProgram::new(ctx);
//! let activity = mp.updatable_message().create_activity_id().await?;
//! ```

mod config;
mod context;
pub mod message;

pub use config::{MiniProgramConfig, DEFAULT_API_BASE};
pub use context::MiniProgramContext;

use message::UpdatableMessage;

pub struct MiniProgram {
    ctx: MiniProgramContext,
}

impl MiniProgram {
    pub fn new(ctx: MiniProgramContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &MiniProgramContext {
        &self.ctx
    }

    pub fn updatable_message(&self) -> UpdatableMessage {
        UpdatableMessage::new(self.ctx.clone())
    }
}
