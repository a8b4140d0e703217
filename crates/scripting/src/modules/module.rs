//! Module record
//!
//! One scripted handler bound to a recvbyte.
//!
//! # States
//! - empty: freshly allocated, `ModuleType::None`
//! - configured: type, recvbyte and delay set from a declaration node
//! - bound: a script entry function is attached (`scripted` and `loaded`)
//!
//! `clear_binding` returns a bound record to configured; `copy_bind` adopts
//! the binding of another record.

use crate::error::ModuleError;
use crate::interface::{InterfaceId, ScriptId};
use otsrv_config::{parse_integer, ConfigNode};

/// Kind of module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ModuleType {
    /// Not configured; never dispatched
    #[default]
    None,

    /// Runs when a client message starts with the module's recvbyte
    RecvByte,
}

impl ModuleType {
    /// Name of the script function implementing this kind
    pub fn event_name(&self) -> &'static str {
        match self {
            ModuleType::RecvByte => "onRecvbyte",
            ModuleType::None => "",
        }
    }
}

/// Scripted recvbyte handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    module_type: ModuleType,
    recvbyte: u8,
    delay: i16,
    script_id: ScriptId,
    script_interface: Option<InterfaceId>,
    scripted: bool,
    loaded: bool,
}

impl Module {
    /// Allocate an empty record for the given runtime
    pub fn new(script_interface: InterfaceId) -> Self {
        Self {
            module_type: ModuleType::None,
            recvbyte: 0,
            delay: 0,
            script_id: ScriptId::UNBOUND,
            script_interface: Some(script_interface),
            scripted: false,
            loaded: false,
        }
    }

    /// Apply a `<module type="recvbyte" byte=".." delay=".."/>` declaration
    ///
    /// On error the record keeps `ModuleType::None` and is rejected by the
    /// registry.
    pub fn configure_from<N: ConfigNode>(&mut self, node: &N) -> Result<(), ModuleError> {
        let type_value = node.attribute("type").ok_or(ModuleError::MissingType)?;
        if !type_value.eq_ignore_ascii_case("recvbyte") {
            return Err(ModuleError::InvalidType(type_value.to_string()));
        }

        let byte_value = node.attribute("byte").ok_or(ModuleError::MissingByte)?;
        let recvbyte = parse_integer(byte_value).ok_or_else(|| ModuleError::InvalidNumber {
            attribute: "byte",
            value: byte_value.to_string(),
        })?;

        let delay = match node.attribute("delay") {
            Some(delay_value) => {
                let delay = parse_integer(delay_value).ok_or_else(|| ModuleError::InvalidNumber {
                    attribute: "delay",
                    value: delay_value.to_string(),
                })?;
                delay.clamp(0, i64::from(i16::MAX)) as i16
            }
            None => 0,
        };

        // Wire opcodes are a single byte; wider literals wrap.
        self.recvbyte = recvbyte as u8;
        self.delay = delay;
        self.module_type = ModuleType::RecvByte;
        Ok(())
    }

    /// Attach a loaded script entry function
    pub fn set_script(&mut self, script_id: ScriptId) -> Result<(), ModuleError> {
        if self.module_type == ModuleType::None {
            return Err(ModuleError::Unconfigured);
        }
        if !script_id.is_bound() {
            return Err(ModuleError::UnboundScript);
        }

        self.script_id = script_id;
        self.scripted = true;
        self.loaded = true;
        Ok(())
    }

    /// Adopt `other`'s script binding, keeping this record's type, recvbyte and delay
    pub fn copy_bind(&mut self, other: &Module) {
        self.script_id = other.script_id;
        self.script_interface = other.script_interface;
        self.scripted = other.scripted;
        self.loaded = other.loaded;
    }

    pub fn clear_binding(&mut self) {
        self.script_id = ScriptId::UNBOUND;
        self.script_interface = None;
        self.scripted = false;
        self.loaded = false;
    }

    pub fn event_name(&self) -> &'static str {
        self.module_type.event_name()
    }

    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    pub fn recvbyte(&self) -> u8 {
        self.recvbyte
    }

    /// Minimum interval between two runs for the same player, in milliseconds
    pub fn delay(&self) -> i16 {
        self.delay
    }

    pub fn script_id(&self) -> ScriptId {
        self.script_id
    }

    pub fn script_interface(&self) -> Option<InterfaceId> {
        self.script_interface
    }

    pub fn is_scripted(&self) -> bool {
        self.scripted
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the binding belongs to the given runtime state
    pub fn is_bound_to(&self, script_interface: InterfaceId) -> bool {
        self.loaded && self.script_interface == Some(script_interface)
    }
}
