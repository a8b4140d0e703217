//! Recvbyte call bridge
//!
//! Marshals `(player, message, recvbyte)` into a script call. Reserving the
//! environment is split from invoking it so the dispatcher can arm the
//! throttle only once a call is guaranteed to happen.

use super::module::Module;
use crate::env::ScriptEnvGuard;
use crate::interface::{ScriptCall, ScriptInterface};
use otsrv_game::Player;
use otsrv_protocol::NetworkMessage;
use std::sync::Arc;

/// Reserve a call environment for `player`'s message
pub(crate) fn reserve_env<'a, S: ScriptInterface>(
    script_interface: &'a S,
    player: &Player,
) -> Option<ScriptEnvGuard<'a>> {
    let env = script_interface.reserve_script_env();
    if env.is_none() {
        tracing::error!(
            "Call stack overflow. Too many lua script calls being nested {}",
            player.name()
        );
    }
    env
}

/// Run `module`'s `onRecvbyte(player, msg, recvbyte)`
///
/// The player is passed as strong userdata and the message as weak userdata.
/// Script errors are handled by the runtime.
pub(crate) fn execute_on_recvbyte<S: ScriptInterface>(
    script_interface: &S,
    env: ScriptEnvGuard<'_>,
    module: &Module,
    player: Arc<Player>,
    msg: &mut NetworkMessage,
) {
    env.set_script_id(module.script_id(), script_interface.id());

    let mut call = ScriptCall::new(module.script_id());
    call.push_player(player)
        .push_message(msg)
        .push_number(i64::from(module.recvbyte()));

    script_interface.call_void_function(env, call);
}
