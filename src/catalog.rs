use std::collections::HashSet;

use crate::project::{Dialog, Trigger};

/// Queries the tree builder makes about trigger kinds.
///
/// Implementations are expected to be pure: the builder may call them any
/// number of times per pass.
pub trait TriggerCatalog {
    /// Human-readable label for a trigger kind
    fn friendly_name(&self, kind: &str) -> String;

    /// Warning text when the trigger cannot run in this dialog
    fn unsupported_warning(&self, dialog: &Dialog, trigger: &Trigger) -> Option<String>;

    /// Whether any trigger in the dialog is unsupported
    fn dialog_has_unsupported(&self, dialog: &Dialog) -> bool {
        dialog
            .triggers
            .iter()
            .any(|t| has_warning(self.unsupported_warning(dialog, t)))
    }
}

/// Empty warning strings count as no warning
pub(crate) fn has_warning(warning: Option<String>) -> bool {
    warning.is_some_and(|w| !w.is_empty())
}

const KIND_PREFIX: &str = "Microsoft.";

const KNOWN_KINDS: &[(&str, &str)] = &[
    ("Microsoft.OnActivity", "Activities"),
    ("Microsoft.OnBeginDialog", "Dialog started"),
    ("Microsoft.OnCancelDialog", "Dialog cancelled"),
    ("Microsoft.OnChooseIntent", "Duplicated intents recognized"),
    ("Microsoft.OnCommandActivity", "Command received"),
    ("Microsoft.OnCommandResultActivity", "Command result received"),
    ("Microsoft.OnCondition", "Handle a condition"),
    ("Microsoft.OnConversationUpdateActivity", "Greeting"),
    ("Microsoft.OnDialogEvent", "Custom event"),
    ("Microsoft.OnEndOfActions", "Actions ended"),
    ("Microsoft.OnEndOfConversationActivity", "Conversation ended"),
    ("Microsoft.OnError", "Error occurred"),
    ("Microsoft.OnEventActivity", "Event received"),
    ("Microsoft.OnHandoffActivity", "Handover to human"),
    ("Microsoft.OnInstallationUpdateActivity", "Installation updated"),
    ("Microsoft.OnIntent", "Intent recognized"),
    ("Microsoft.OnInvokeActivity", "Conversation invoked"),
    ("Microsoft.OnMessageActivity", "Message received"),
    ("Microsoft.OnMessageDeleteActivity", "Message deleted"),
    ("Microsoft.OnMessageReactionActivity", "Message reaction"),
    ("Microsoft.OnMessageUpdateActivity", "Message updated"),
    ("Microsoft.OnQnAMatch", "QnA intent recognized"),
    ("Microsoft.OnRepromptDialog", "Re-prompt for input"),
    ("Microsoft.OnTypingActivity", "User is typing"),
    ("Microsoft.OnUnknownIntent", "Unknown intent"),
];

/// Trigger catalog backed by the table of well-known adaptive dialog kinds
#[derive(Debug, Clone, Default)]
pub struct BuiltinCatalog {
    disabled: HashSet<String>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the given kinds as unsupported even though they are known
    pub fn with_disabled<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disabled: kinds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_known(kind: &str) -> bool {
        KNOWN_KINDS.iter().any(|(k, _)| *k == kind)
    }
}

impl TriggerCatalog for BuiltinCatalog {
    fn friendly_name(&self, kind: &str) -> String {
        if let Some((_, label)) = KNOWN_KINDS.iter().find(|(k, _)| *k == kind) {
            return (*label).to_string();
        }

        // Microsoft.OnFooBar -> FooBar
        let short = kind.strip_prefix(KIND_PREFIX).unwrap_or(kind);
        let short = short.strip_prefix("On").filter(|s| !s.is_empty()).unwrap_or(short);
        short.to_string()
    }

    fn unsupported_warning(&self, _dialog: &Dialog, trigger: &Trigger) -> Option<String> {
        if self.disabled.contains(&trigger.kind) {
            return Some(format!("{} is disabled in this workspace", trigger.kind));
        }
        if !Self::is_known(&trigger.kind) {
            return Some(format!("{} is not a supported trigger type", trigger.kind));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_name_known() {
        let catalog = BuiltinCatalog::new();
        assert_eq!(catalog.friendly_name("Microsoft.OnIntent"), "Intent recognized");
        assert_eq!(
            catalog.friendly_name("Microsoft.OnConversationUpdateActivity"),
            "Greeting"
        );
    }

    #[test]
    fn test_friendly_name_fallback() {
        let catalog = BuiltinCatalog::new();
        assert_eq!(catalog.friendly_name("Microsoft.OnSomethingNew"), "SomethingNew");
        assert_eq!(catalog.friendly_name("Contoso.Custom"), "Contoso.Custom");
        assert_eq!(catalog.friendly_name("On"), "On");
    }

    #[test]
    fn test_unsupported_warning() {
        let catalog = BuiltinCatalog::with_disabled(["Microsoft.OnQnAMatch"]);
        let dialog = Dialog::new("d1", "Main");

        assert!(catalog
            .unsupported_warning(&dialog, &Trigger::new("Microsoft.OnIntent"))
            .is_none());

        let disabled = catalog
            .unsupported_warning(&dialog, &Trigger::new("Microsoft.OnQnAMatch"))
            .unwrap();
        assert!(disabled.contains("disabled"));

        let unknown = catalog
            .unsupported_warning(&dialog, &Trigger::new("Contoso.OnThing"))
            .unwrap();
        assert!(unknown.contains("Contoso.OnThing"));
    }

    #[test]
    fn test_dialog_has_unsupported() {
        let catalog = BuiltinCatalog::new();
        let ok = Dialog::new("d1", "Main").with_trigger(Trigger::new("Microsoft.OnError"));
        let bad = ok.clone().with_trigger(Trigger::new("Contoso.OnThing"));

        assert!(!catalog.dialog_has_unsupported(&ok));
        assert!(catalog.dialog_has_unsupported(&bad));
        assert!(!catalog.dialog_has_unsupported(&Dialog::new("d2", "Empty")));
    }
}
