// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compilation options.

use std::path::{Path, PathBuf};

use kestrel_macros::const_assert;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest register file the VM can address.
pub const VM_MAX_REGISTERS: u32 = u16::MAX as u32;

/// Largest lexical environment the VM can address.
pub const VM_MAX_LEXICAL_SLOTS: u32 = u16::MAX as u32;

// Indices must fit the 16-bit operands of the wide forms.
const_assert!(VM_MAX_REGISTERS <= u16::MAX as u32 + 1);
const_assert!(VM_MAX_LEXICAL_SLOTS <= u16::MAX as u32 + 1);

/// Errors loading options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The file
        path: PathBuf,
        /// The cause
        source: std::io::Error,
    },
    /// The file is not valid TOML for these options
    #[error("invalid compile options: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Options for one compilation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Register file limit per function
    pub max_registers: u32,

    /// Slot limit per lexical environment
    pub max_lexical_slots: u32,

    /// Record a source position for every instruction
    pub debug_info: bool,

    /// Compile pending functions on the rayon pool
    pub parallel: bool,

    /// Top-level let/const of scripts go to the global lexical record
    pub strict_global_let: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_registers: VM_MAX_REGISTERS,
            max_lexical_slots: VM_MAX_LEXICAL_SLOTS,
            debug_info: true,
            parallel: false,
            strict_global_let: true,
        }
    }
}

impl CompileOptions {
    /// Parses options from TOML text; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut options: Self = toml::from_str(text)?;
        options.clamp_to_vm();
        Ok(options)
    }

    /// Loads options from a TOML file, then applies `KESTREL_*` overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut options = Self::from_toml_str(&text)?;
        options.load_from_env();
        Ok(options)
    }

    /// Overlays every value of `other` that differs from the default.
    pub fn merge(&mut self, other: &CompileOptions) {
        let defaults = CompileOptions::default();
        if other.max_registers != defaults.max_registers {
            self.max_registers = other.max_registers;
        }
        if other.max_lexical_slots != defaults.max_lexical_slots {
            self.max_lexical_slots = other.max_lexical_slots;
        }
        if other.debug_info != defaults.debug_info {
            self.debug_info = other.debug_info;
        }
        if other.parallel != defaults.parallel {
            self.parallel = other.parallel;
        }
        if other.strict_global_let != defaults.strict_global_let {
            self.strict_global_let = other.strict_global_let;
        }
        self.clamp_to_vm();
    }

    /// Applies `KESTREL_MAX_REGISTERS`-style environment variables.
    fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(option) = key.strip_prefix("KESTREL_") {
                self.set(&option.to_lowercase(), &value);
            }
        }
    }

    /// Sets one option by its TOML key. Unknown keys and bad values are ignored.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "max_registers" => {
                if let Ok(n) = value.parse() {
                    self.max_registers = n;
                }
            }
            "max_lexical_slots" => {
                if let Ok(n) = value.parse() {
                    self.max_lexical_slots = n;
                }
            }
            "debug_info" => self.debug_info = value == "true",
            "parallel" => self.parallel = value == "true",
            "strict_global_let" => self.strict_global_let = value == "true",
            _ => {}
        }
        self.clamp_to_vm();
    }

    fn clamp_to_vm(&mut self) {
        self.max_registers = self.max_registers.min(VM_MAX_REGISTERS);
        self.max_lexical_slots = self.max_lexical_slots.min(VM_MAX_LEXICAL_SLOTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert_eq!(options.max_registers, 65535);
        assert!(options.debug_info);
        assert!(!options.parallel);
    }

    #[test]
    fn test_partial_toml() {
        let options = CompileOptions::from_toml_str("max_registers = 16\ndebug_info = false\n").unwrap();
        assert_eq!(options.max_registers, 16);
        assert!(!options.debug_info);
        assert_eq!(options.max_lexical_slots, VM_MAX_LEXICAL_SLOTS);
    }

    #[test]
    fn test_limits_clamped_to_vm() {
        let options = CompileOptions::from_toml_str("max_registers = 1000000").unwrap();
        assert_eq!(options.max_registers, VM_MAX_REGISTERS);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            CompileOptions::from_toml_str("max_registers = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_merge_and_set() {
        let mut base = CompileOptions::default();
        let overlay = CompileOptions {
            parallel: true,
            ..CompileOptions::default()
        };
        base.merge(&overlay);
        assert!(base.parallel);
        assert!(base.debug_info);

        base.set("max_lexical_slots", "8");
        base.set("max_lexical_slots", "not a number");
        base.set("unknown", "1");
        assert_eq!(base.max_lexical_slots, 8);
    }

    #[test]
    fn test_load_missing_file() {
        let err = CompileOptions::load(Path::new("/nonexistent/kestrel.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
