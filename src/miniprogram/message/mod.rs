//! Mini-program messages

mod updatable;

pub use updatable::{
    CreateActivityIdResponse, SendUpdatableMsgReq, UpdatableMessage, UpdatableMsgParameter,
    UpdatableMsgTemplate, UpdatableTargetState,
};
