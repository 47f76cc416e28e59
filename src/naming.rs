//! Naming convention conversions for SQL Server identifiers.
//!
//! Parameters and columns are declared in upper underscore case (`@FIRST_NAME`,
//! `ORDER_ITEM_ID`) while callers address them in camelCase (JSON, query
//! strings) or PascalCase (record fields). These helpers convert between the
//! conventions and normalize schema-qualified object names.
//!
//! # Examples
//!
//! ```
//! use rust_sqlproc::naming::*;
//!
//! assert_eq!(to_underscore("orderItemId"), "ORDER_ITEM_ID");
//! assert_eq!(to_camel("ORDER_ITEM_ID"), "orderItemId");
//! assert_eq!(to_proper_case("ORDER_ITEM_ID"), "OrderItemId");
//! assert_eq!(normalize_object_name("open.POST_PERSON", "dbo"), "[open].[POST_PERSON]");
//! ```

/// Parameter name sigil used by SQL Server
pub const PARAMETER_SIGIL: char = '@';

/// Converts camelCase or PascalCase to upper underscore case.
///
/// A word boundary is a lowercase letter or digit followed by an uppercase
/// letter. Existing underscores are kept.
///
/// ```
/// # use rust_sqlproc::naming::to_underscore;
/// assert_eq!(to_underscore("firstName"), "FIRST_NAME");
/// assert_eq!(to_underscore("AddressLine1"), "ADDRESS_LINE1");
/// assert_eq!(to_underscore("line1A"), "LINE1_A");
/// ```
pub fn to_underscore(value: &str) -> String {
    let mut output = String::with_capacity(value.len() * 2);
    let mut previous_lower_or_digit = false;

    for current in value.chars() {
        if previous_lower_or_digit && current.is_uppercase() {
            output.push('_');
        }
        output.extend(current.to_uppercase());
        previous_lower_or_digit = current.is_lowercase() || current.is_ascii_digit();
    }
    output
}

/// Converts upper underscore case to PascalCase.
///
/// ```
/// # use rust_sqlproc::naming::to_proper_case;
/// assert_eq!(to_proper_case("FIRST_NAME"), "FirstName");
/// assert_eq!(to_proper_case("ID"), "Id");
/// ```
pub fn to_proper_case(value: &str) -> String {
    convert_segments(value, true)
}

/// Converts upper underscore case to camelCase.
///
/// ```
/// # use rust_sqlproc::naming::to_camel;
/// assert_eq!(to_camel("FIRST_NAME"), "firstName");
/// assert_eq!(to_camel("ADDRESS_LINE_1"), "addressLine1");
/// ```
pub fn to_camel(value: &str) -> String {
    convert_segments(value, false)
}

fn convert_segments(value: &str, capitalize_first: bool) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_underscore = true;

    for (idx, current) in value.chars().enumerate() {
        if current == '_' {
            previous_underscore = true;
            continue;
        }
        if previous_underscore && (idx != 0 || capitalize_first) {
            output.extend(current.to_uppercase());
        } else {
            output.extend(current.to_lowercase());
        }
        previous_underscore = false;
    }
    output
}

/// Strips the `@` sigil from a parameter name.
pub fn bare_parameter_name(name: &str) -> &str {
    name.strip_prefix(PARAMETER_SIGIL).unwrap_or(name)
}

/// Builds the canonical parameter name for a surface name in any convention.
///
/// ```
/// # use rust_sqlproc::naming::parameter_name_for;
/// assert_eq!(parameter_name_for("FirstName"), "@FIRST_NAME");
/// ```
pub fn parameter_name_for(surface_name: &str) -> String {
    format!("{}{}", PARAMETER_SIGIL, to_underscore(surface_name))
}

/// Schema that owns objects named without one
pub const DEFAULT_SCHEMA: &str = "dbo";

/// One part of an object name with its `[...]` or `"..."` quoting removed
fn unquoted(part: &str) -> &str {
    let part = part.trim();
    part.strip_prefix('[')
        .and_then(|p| p.strip_suffix(']'))
        .or_else(|| part.strip_prefix('"').and_then(|p| p.strip_suffix('"')))
        .unwrap_or(part)
}

fn bracketed(schema: &str, name: &str, default_schema: &str) -> String {
    let schema = match unquoted(schema) {
        "" => default_schema,
        schema => schema,
    };
    format!("[{}].[{}]", schema, unquoted(name))
}

/// Formats a schema and object name as `[schema].[name]`; a blank schema
/// is [`DEFAULT_SCHEMA`].
pub fn qualified_name(schema: &str, name: &str) -> String {
    bracketed(schema, name, DEFAULT_SCHEMA)
}

/// Normalizes an object name to `[schema].[name]`, applying the default
/// schema when none is given.
pub fn normalize_object_name(name: &str, default_schema: &str) -> String {
    let trimmed = name.trim();

    // `[a.b].[c]` style names may hold dots inside the brackets
    let bracket_split = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.split_once("].["))
        .map(|(schema, object)| (schema, object.strip_suffix(']').unwrap_or(object)));

    let (schema, object) = bracket_split
        .or_else(|| trimmed.split_once('.'))
        .unwrap_or(("", trimmed));
    bracketed(schema, object, default_schema)
}
