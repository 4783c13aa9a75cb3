use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyModifiers};
use serde::Deserialize;
use tokio::fs;

use crate::catalog::BuiltinCatalog;
use crate::error::Result;
use crate::filter::FILTER_DEBOUNCE;
use crate::project::ProjectStore;
use crate::tree::TreeOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    keybindings: HashMap<String, OneOrMany>,
    /// Filter debounce override in milliseconds. The navigator's
    /// behavior is defined against the fixed 1000 ms window
    /// ([`FILTER_DEBOUNCE`]); leave unset outside of testing.
    #[serde(default)]
    pub filter_debounce_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub show_dialogs: bool,
    #[serde(default = "default_true")]
    pub show_triggers: bool,
    #[serde(default)]
    pub disabled_trigger_kinds: Vec<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            keybindings: HashMap::new(),
            filter_debounce_ms: None,
            show_dialogs: true,
            show_triggers: true,
            disabled_trigger_kinds: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Load `~/.botnav/config.json`, if present
    pub async fn load() -> Result<Option<Self>> {
        let path = ProjectStore::base_dir()?.join("config.json");
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        let cfg = serde_json::from_str::<Self>(&content)?;
        Ok(Some(cfg))
    }

    pub fn filter_debounce(&self) -> Duration {
        self.filter_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(FILTER_DEBOUNCE)
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            show_dialogs: self.show_dialogs,
            show_triggers: self.show_triggers,
        }
    }

    pub fn catalog(&self) -> BuiltinCatalog {
        BuiltinCatalog::with_disabled(self.disabled_trigger_kinds.iter().cloned())
    }

    /// Default bindings with this file's overrides applied
    pub fn key_bindings(&self) -> KeyBindings {
        let mut kb = KeyBindings::default();

        for (action, spec) in self.keybindings.clone() {
            let mut parsed = Vec::new();
            for s in spec.into_vec() {
                match parse_key_spec(&s) {
                    Some(k) => parsed.push(k),
                    None => tracing::warn!("Ignoring invalid key spec {:?} for {}", s, action),
                }
            }
            if !parsed.is_empty() {
                if let Some(slot) = kb.bindings.get_mut(action.as_str()) {
                    *slot = parsed;
                }
            }
        }

        kb
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    const fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    const fn ctrl(c: char) -> Self {
        Self {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: HashMap<&'static str, Vec<KeySpec>>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use KeyCode::*;

        let defaults: [(&'static str, Vec<KeySpec>); 11] = [
            (
                "quit",
                vec![KeySpec::plain(Char('q')), KeySpec::ctrl('c')],
            ),
            (
                "up",
                vec![KeySpec::plain(Up), KeySpec::plain(Char('k'))],
            ),
            (
                "down",
                vec![KeySpec::plain(Down), KeySpec::plain(Char('j'))],
            ),
            ("select", vec![KeySpec::plain(Enter)]),
            ("collapse", vec![KeySpec::plain(Left)]),
            ("expand", vec![KeySpec::plain(Right)]),
            ("toggle", vec![KeySpec::plain(Char(' '))]),
            ("search", vec![KeySpec::plain(Char('/'))]),
            ("delete", vec![KeySpec::plain(Char('d'))]),
            ("reload", vec![KeySpec::plain(Char('r'))]),
            ("help", vec![KeySpec::plain(Char('?'))]),
        ];

        Self {
            bindings: defaults.into_iter().collect(),
        }
    }
}

impl KeySpec {
    /// Short label for status and help hints
    pub fn label(&self) -> String {
        let key = match self.code {
            KeyCode::Char(' ') => "Space".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::Esc => "Esc".to_string(),
            KeyCode::Tab => "Tab".to_string(),
            KeyCode::Backspace => "Backspace".to_string(),
            KeyCode::Delete => "Del".to_string(),
            KeyCode::Up => "↑".to_string(),
            KeyCode::Down => "↓".to_string(),
            KeyCode::Left => "←".to_string(),
            KeyCode::Right => "→".to_string(),
            other => format!("{other:?}"),
        };

        let mut label = String::new();
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            label.push_str("Ctrl+");
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            label.push_str("Alt+");
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            label.push_str("Shift+");
        }
        label.push_str(&key);
        label
    }
}

impl KeyBindings {
    /// Label of the first key bound to `action`
    pub fn hint(&self, action: &str) -> String {
        self.bindings
            .get(action)
            .and_then(|v| v.first())
            .map(KeySpec::label)
            .unwrap_or_default()
    }

    /// Labels of every key bound to `action`, joined with `/`
    pub fn hints(&self, action: &str) -> String {
        self.bindings
            .get(action)
            .map(|v| v.iter().map(KeySpec::label).collect::<Vec<_>>().join("/"))
            .unwrap_or_default()
    }

    pub fn matches(&self, action: &'static str, code: &KeyCode, modifiers: KeyModifiers) -> bool {
        self.bindings
            .get(action)
            .is_some_and(|v| v.iter().any(|k| &k.code == code && k.modifiers == modifiers))
    }
}

fn parse_key_spec(s: &str) -> Option<KeySpec> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut modifiers = KeyModifiers::NONE;
    let parts: Vec<&str> = s.split('+').map(|p| p.trim()).collect();
    let (mods, key_part) = if parts.len() >= 2 {
        (&parts[..parts.len() - 1], parts[parts.len() - 1])
    } else {
        (&[][..], parts[0])
    };

    for m in mods {
        match m.to_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
            "alt" => modifiers |= KeyModifiers::ALT,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            _ => return None,
        }
    }

    let code = match key_part.to_lowercase().as_str() {
        "enter" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "space" => KeyCode::Char(' '),
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        _ => {
            // Single-character fallback (keeps case for e.g. "D")
            let mut chars = key_part.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };

    Some(KeySpec { code, modifiers })
}
