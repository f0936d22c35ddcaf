//! Utility functions for processing data in the YAML file format
use std::io::Write;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_yaml::Value;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents every error which can be encountered during YAML (de)serialization.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid YAML"))]
    ParseYaml { source: serde_yaml::Error },

    #[snafu(display("failed to deserialize {kind} document"))]
    DeserializeDocument {
        source: serde_yaml::Error,
        kind: String,
    },

    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to parse bytes as valid UTF-8 string"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Parses a single YAML document into a generic [`Value`].
///
/// An empty input yields [`Value::Null`].
pub fn parse_document(input: &str) -> Result<Value> {
    serde_yaml::from_str(input).context(ParseYamlSnafu)
}

/// Parses a `---` separated stream of YAML documents.
///
/// Empty documents are kept as [`Value::Null`], callers decide whether to skip them.
pub fn parse_documents(input: &str) -> Result<Vec<Value>> {
    serde_yaml::Deserializer::from_str(input)
        .map(|document| Value::deserialize(document).context(ParseYamlSnafu))
        .collect()
}

/// Deserializes a generic YAML document into a typed resource.
///
/// A [`Value::Null`] document deserializes into `T::default()`. Unquoted
/// scalars in `metadata.annotations` and `metadata.labels` (such as
/// `proxy-body-size: 10`) are read as their string form.
pub fn from_value<T>(mut document: Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if document.is_null() {
        return Ok(T::default());
    }

    stringify_metadata_scalars(&mut document);
    let kind = document
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("untyped")
        .to_owned();
    serde_yaml::from_value(document).context(DeserializeDocumentSnafu { kind })
}

fn stringify_metadata_scalars(document: &mut Value) {
    let Some(metadata) = document.get_mut("metadata") else {
        return;
    };

    for field in ["annotations", "labels"] {
        let Some(Value::Mapping(values)) = metadata.get_mut(field) else {
            continue;
        };

        for (_, value) in values.iter_mut() {
            let text = match value {
                Value::Bool(flag) => flag.to_string(),
                Value::Number(number) => number.to_string(),
                Value::Null => String::new(),
                _ => continue,
            };
            *value = Value::String(text);
        }
    }
}

/// Returns the `kind` of a generic document, empty if it has none.
pub fn document_kind(document: &Value) -> &str {
    document.get("kind").and_then(Value::as_str).unwrap_or_default()
}

/// Provides configurable options during YAML serialization.
pub struct SerializeOptions {
    /// Adds leading triple dashes (`---`) to every document.
    pub explicit_document: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
        }
    }
}

/// Serializes the given data structure and writes it to a [`Writer`](Write).
pub fn serialize<T, W>(value: &T, mut writer: W, options: &SerializeOptions) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    if options.explicit_document {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);
    value
        .serialize(&mut serializer)
        .context(SerializeYamlSnafu)?;

    Ok(())
}

/// Collects resources into one multi-document YAML stream, in push order.
#[derive(Debug, Default)]
pub struct DocumentWriter {
    buffer: Vec<u8>,
}

impl DocumentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` as a new explicit document.
    pub fn push<T: Serialize>(&mut self, value: &T) -> Result<&mut Self> {
        serialize(value, &mut self.buffer, &SerializeOptions::default())?;
        Ok(self)
    }

    /// Appends every item of `values` as its own document.
    pub fn extend<'a, T, I>(&mut self, values: I) -> Result<&mut Self>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for value in values {
            self.push(value)?;
        }
        Ok(self)
    }

    pub fn finish(self) -> Result<String> {
        String::from_utf8(self.buffer).context(ParseUtf8BytesSnafu)
    }
}

/// Serializes a single resource as an explicit YAML document.
pub fn to_document_string<T: Serialize>(value: &T) -> Result<String> {
    let mut writer = DocumentWriter::new();
    writer.push(value)?;
    writer.finish()
}
