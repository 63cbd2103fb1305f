//! Build-option domain entities
//!
//! Options are a closed sum over the value kinds the tool can emit. Value
//! mutation goes through [`BuildOption::set_value`], which enforces the
//! per-kind rules (a combo only accepts one of its choices).

/// Tri-state of a `feature` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Enabled,
    Disabled,
    Auto,
}

impl FeatureState {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Auto => "auto",
        }
    }
}

/// Current value of a build option, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Integer(i64),
    Text(String),
    Boolean(bool),
    Combo { choices: Vec<String>, value: String },
    Feature(FeatureState),
    Array(Vec<String>),
    Unknown,
}

/// One configurable build option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOption {
    pub name: String,
    pub section: String,
    pub subproject: Option<String>,
    pub description: String,
    pub value: OptionValue,
}

impl BuildOption {
    /// A `subproject:name` option name is split at construction; the
    /// option keeps the bare name and remembers its owning subproject.
    pub fn new(
        name: impl Into<String>,
        section: impl Into<String>,
        description: impl Into<String>,
        value: OptionValue,
    ) -> Self {
        let name = name.into();
        let (subproject, name) = match name.split_once(':') {
            Some((sub, _)) => {
                let bare = name.split(':').next_back().unwrap_or_default().to_owned();
                (Some(sub.to_owned()), bare)
            }
            None => (None, name),
        };
        Self {
            name,
            section: section.into(),
            subproject,
            description: description.into(),
            value,
        }
    }

    /// Set the value from its textual form, respecting the option kind.
    ///
    /// A combo or feature value outside the choice list is silently
    /// ignored, as is any value on an unknown option.
    pub fn set_value(&mut self, value: &str) {
        match &mut self.value {
            OptionValue::Integer(current) => {
                if let Ok(parsed) = value.parse() {
                    *current = parsed;
                }
            }
            OptionValue::Text(current) => *current = value.to_owned(),
            OptionValue::Boolean(current) => *current = matches!(value, "true" | "1"),
            OptionValue::Combo {
                choices,
                value: current,
            } => {
                if choices.iter().any(|choice| choice == value) {
                    *current = value.to_owned();
                }
            }
            OptionValue::Feature(current) => {
                if let Some(state) = FeatureState::from_str(value) {
                    *current = state;
                }
            }
            OptionValue::Array(current) => {
                *current = value.split(':').map(str::to_owned).collect();
            }
            OptionValue::Unknown => {}
        }
    }

    /// Textual form of the current value, as shown to the user and as
    /// passed back to the tool via `-D name=value`.
    pub fn value_str(&self) -> String {
        match &self.value {
            OptionValue::Integer(value) => value.to_string(),
            OptionValue::Text(value) => value.clone(),
            OptionValue::Boolean(value) => value.to_string(),
            OptionValue::Combo { value, .. } => value.clone(),
            OptionValue::Feature(state) => state.as_str().to_owned(),
            OptionValue::Array(values) => values.join(":"),
            OptionValue::Unknown => "Unknown option".to_owned(),
        }
    }
}
