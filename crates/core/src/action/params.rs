use crate::action::request::ActionParameter;

/// First value whose name matches exactly. Names are not unique on the wire.
pub fn parameter<'a>(parameters: &'a [ActionParameter], name: &str) -> Option<&'a str> {
    parameters
        .iter()
        .find(|parameter| parameter.name == name)
        .map(|parameter| parameter.value.as_str())
}
