//! Updatable messages
//!
//! Share cards whose status line the server rewrites as an activity moves
//! from not started to started to finished. Transitions are forwarded
//! verbatim; the platform enforces their order.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{self, ApiError, CommonError};
use crate::miniprogram::context::MiniProgramContext;

const CREATE_ACTIVITY_PATH: &str = "/cgi-bin/message/wxopen/activityid/create";
const SET_UPDATABLE_MSG_PATH: &str = "/cgi-bin/message/wxopen/updatablemsg/send";

/// Activity status, serialized as `0`/`1`/`2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UpdatableTargetState {
    NotStarted,
    Started,
    Finished,
}

impl From<UpdatableTargetState> for u8 {
    fn from(state: UpdatableTargetState) -> Self {
        match state {
            UpdatableTargetState::NotStarted => 0,
            UpdatableTargetState::Started => 1,
            UpdatableTargetState::Finished => 2,
        }
    }
}

impl TryFrom<u8> for UpdatableTargetState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UpdatableTargetState::NotStarted),
            1 => Ok(UpdatableTargetState::Started),
            2 => Ok(UpdatableTargetState::Finished),
            other => Err(format!("unknown target_state {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateActivityIdResponse {
    #[serde(flatten)]
    pub common: CommonError,

    #[serde(default)]
    pub activity_id: String,

    /// Unix seconds
    #[serde(default)]
    pub expiration_time: i64,
}

impl CreateActivityIdResponse {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expiration_time, 0).single()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatableMsgTemplate {
    pub parameter_list: Vec<UpdatableMsgParameter>,
}

impl UpdatableMsgTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameter_list.push(UpdatableMsgParameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatableMsgParameter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendUpdatableMsgReq {
    pub activity_id: String,
    pub template_info: UpdatableMsgTemplate,
    pub target_state: UpdatableTargetState,
}

pub struct UpdatableMessage {
    ctx: MiniProgramContext,
}

impl UpdatableMessage {
    pub fn new(ctx: MiniProgramContext) -> Self {
        Self { ctx }
    }

    /// Create an activity id for a new updatable message
    pub async fn create_activity_id(&self) -> Result<CreateActivityIdResponse, ApiError> {
        let url = self.ctx.authed_url(CREATE_ACTIVITY_PATH).await?;
        let body = self.ctx.http().get(&url).await?;
        let res: CreateActivityIdResponse = http::decode_with_error(&body, "CreateActivityID")?;

        debug!(
            "Created activity {} (expires {})",
            res.activity_id, res.expiration_time
        );
        Ok(res)
    }

    /// Move an activity to `target_state` with the given template values
    pub async fn set_updatable_msg(
        &self,
        activity_id: &str,
        target_state: UpdatableTargetState,
        template: UpdatableMsgTemplate,
    ) -> Result<(), ApiError> {
        let url = self.ctx.authed_url(SET_UPDATABLE_MSG_PATH).await?;
        let req = SendUpdatableMsgReq {
            activity_id: activity_id.to_string(),
            template_info: template,
            target_state,
        };

        let body = http::post_json(self.ctx.http(), &url, &req).await?;
        http::decode_with_common_error(&body, "SendUpdatableMsg")?;

        debug!("Activity {} set to {:?}", activity_id, target_state);
        Ok(())
    }
}
