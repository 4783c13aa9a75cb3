use serde::{Deserialize, Serialize};

/// One bot project as held by the project store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub dialogs: Vec<Dialog>,
}

/// A conversational flow definition inside a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialog {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

/// An event handler inside a dialog. Identified only by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Project {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            is_remote: false,
            dialogs: Vec::new(),
        }
    }

    pub fn with_dialog(mut self, dialog: Dialog) -> Self {
        self.dialogs.push(dialog);
        self
    }

    pub fn dialog(&self, id: &str) -> Option<&Dialog> {
        self.dialogs.iter().find(|d| d.id == id)
    }

    /// The main dialog, if the project has one
    pub fn root_dialog(&self) -> Option<&Dialog> {
        self.dialogs.iter().find(|d| d.is_root)
    }
}

impl Dialog {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            is_root: false,
            triggers: Vec::new(),
        }
    }

    pub fn root(mut self) -> Self {
        self.is_root = true;
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }
}

impl Trigger {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            display_name: None,
        }
    }

    pub fn named(kind: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Explicit display name, treating an empty string as unset
    pub fn explicit_name(&self) -> Option<&str> {
        self.display_name.as_deref().filter(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_type_field() {
        let json = r#"{"type":"Microsoft.OnIntent","displayName":"Hello"}"#;
        let trigger: Trigger = serde_json::from_str(json).unwrap();
        assert_eq!(trigger.kind, "Microsoft.OnIntent");
        assert_eq!(trigger.explicit_name(), Some("Hello"));

        let out = serde_json::to_string(&Trigger::new("Microsoft.OnError")).unwrap();
        assert_eq!(out, r#"{"type":"Microsoft.OnError"}"#);
    }

    #[test]
    fn test_empty_display_name_is_unset() {
        let trigger = Trigger::named("Microsoft.OnIntent", "");
        assert_eq!(trigger.explicit_name(), None);
    }

    #[test]
    fn test_project_defaults() {
        let json = r#"{"projectId":"p1","name":"Bot1"}"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert!(!project.is_remote);
        assert!(project.dialogs.is_empty());
        assert!(project.root_dialog().is_none());
    }

    #[test]
    fn test_root_dialog() {
        let project = Project::new("p1", "Bot1")
            .with_dialog(Dialog::new("d2", "Greeting"))
            .with_dialog(Dialog::new("d1", "Main").root());
        assert_eq!(project.root_dialog().map(|d| d.id.as_str()), Some("d1"));
        assert!(project.dialog("d2").is_some());
    }
}
