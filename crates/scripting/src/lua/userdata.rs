//! Userdata types handed to Lua scripts

use mlua::{AnyUserData, MetaMethod, UserData, UserDataMethods};
use otsrv_game::Player;
use otsrv_protocol::NetworkMessage;
use std::sync::Arc;

/// Strong player handle; scripts keep the player alive while they hold it
pub struct LuaPlayer(pub Arc<Player>);

impl LuaPlayer {
    pub const TYPE_NAME: &'static str = "Player";
}

impl UserData for LuaPlayer {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_method("getId", |_, this, ()| Ok(this.0.id.get()));
        methods.add_method("getName", |_, this, ()| Ok(this.0.name().to_string()));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("{}: {}", Self::TYPE_NAME, this.0.name()))
        });
    }
}

/// Borrowed message handle, valid only inside the call that created it
///
/// Created through `Scope::create_nonstatic_userdata`, so once the call
/// returns any use of a retained handle raises a Lua error.
pub struct LuaMessage<'a>(pub &'a mut NetworkMessage);

impl LuaMessage<'_> {
    pub const TYPE_NAME: &'static str = "NetworkMessage";
}

impl<'a> UserData for LuaMessage<'a> {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_method_mut("getByte", |_, this, ()| {
            this.0.get_byte().map_err(mlua::Error::external)
        });
        methods.add_method_mut("getU16", |_, this, ()| {
            this.0.get_u16().map_err(mlua::Error::external)
        });
        methods.add_method_mut("getU32", |_, this, ()| {
            this.0.get_u32().map_err(mlua::Error::external)
        });
        methods.add_method_mut("getString", |_, this, ()| {
            this.0.get_string().map_err(mlua::Error::external)
        });

        methods.add_method_mut("addByte", |_, this, value: u8| {
            this.0.add_byte(value).map_err(mlua::Error::external)
        });
        methods.add_method_mut("addU16", |_, this, value: u16| {
            this.0.add_u16(value).map_err(mlua::Error::external)
        });
        methods.add_method_mut("addU32", |_, this, value: u32| {
            this.0.add_u32(value).map_err(mlua::Error::external)
        });
        methods.add_method_mut("addString", |_, this, value: String| {
            this.0.add_string(&value).map_err(mlua::Error::external)
        });

        methods.add_method("getLength", |_, this, ()| Ok(this.0.len()));
        methods.add_method("getPosition", |_, this, ()| Ok(this.0.position()));
        methods.add_method_mut("skipBytes", |_, this, count: usize| {
            this.0.skip_bytes(count).map_err(mlua::Error::external)
        });
        methods.add_method_mut("reset", |_, this, ()| {
            this.0.reset();
            Ok(())
        });

        // Queue a copy of the body for the player's client
        methods.add_method("sendToPlayer", |_, this, player: AnyUserData| {
            let player = player.borrow::<LuaPlayer>()?;
            player.0.send(this.0.to_bytes());
            Ok(())
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("{}: {} bytes", LuaMessage::TYPE_NAME, this.0.len()))
        });
    }
}
