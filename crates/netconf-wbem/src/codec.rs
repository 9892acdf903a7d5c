// crates/netconf-wbem/src/codec.rs
// ============================================================================
// Module: CIM-XML Codec
// Description: Encoding of CIM-XML requests and decoding of responses.
// Purpose: Translate between the typed model and DSP0201 documents.
// Dependencies: quick-xml (via xml)
// ============================================================================

//! ## Overview
//! Requests are built as [`XmlElement`] trees: intrinsic calls use
//! `IMETHODCALL` with a `LOCALNAMESPACEPATH`, extrinsic calls use
//! `METHODCALL` with a `LOCALINSTANCEPATH`. Responses are parsed into a tree
//! and decoded into model types. `<ERROR>` becomes [`WbemError::Cim`].
//!
//! Embedded instances travel as escaped XML inside `<VALUE>` and are decoded
//! recursively.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::WbemError;
use crate::model::CimInstance;
use crate::model::CimInstanceName;
use crate::model::CimType;
use crate::model::CimValue;
use crate::model::MethodResult;
use crate::xml::XmlElement;
use crate::xml::parse_document;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// XML declaration prefixed to every document.
const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n";
/// Export method carrying indications.
pub const EXPORT_INDICATION: &str = "ExportIndication";

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Parameter of an intrinsic operation.
#[derive(Debug, Clone, PartialEq)]
pub enum IParam {
    /// `<CLASSNAME NAME=...>`
    ClassName(String),
    /// `<INSTANCENAME ...>`
    InstanceName(CimInstanceName),
    /// `<INSTANCE ...>`
    Instance(CimInstance),
    /// `<VALUE.NAMEDINSTANCE>` built from an instance and its path.
    NamedInstance(CimInstance),
    /// `<VALUE>` string.
    Value(String),
    /// `<VALUE>TRUE|FALSE</VALUE>`
    Bool(bool),
    /// `<VALUE.ARRAY>` of strings.
    StringArray(Vec<String>),
}

/// Decoded export (indication delivery) request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    /// `MESSAGE ID` to echo in the response.
    pub message_id: String,
    /// Indications carried by the request.
    pub indications: Vec<CimInstance>,
}

// ============================================================================
// SECTION: Request Encoding
// ============================================================================

/// Builds an intrinsic method call document.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] when a parameter cannot be encoded.
pub fn imethod_request(
    message_id: u64,
    method: &str,
    namespace: &str,
    params: &[(&str, IParam)],
) -> Result<String, WbemError> {
    let mut call =
        XmlElement::new("IMETHODCALL").attr("NAME", method).child(local_namespace_path(namespace));
    for (name, param) in params {
        let value = match param {
            IParam::ClassName(classname) => XmlElement::new("CLASSNAME").attr("NAME", classname),
            IParam::InstanceName(path) => encode_instance_name(path)?,
            IParam::Instance(instance) => encode_instance(instance)?,
            IParam::NamedInstance(instance) => XmlElement::new("VALUE.NAMEDINSTANCE")
                .child(encode_instance_name(instance.require_path()?)?)
                .child(encode_instance(instance)?),
            IParam::Value(text) => XmlElement::new("VALUE").text(text.as_str()),
            IParam::Bool(flag) => {
                XmlElement::new("VALUE").text(if *flag { "TRUE" } else { "FALSE" })
            }
            IParam::StringArray(items) => XmlElement::new("VALUE.ARRAY")
                .children(items.iter().map(|item| XmlElement::new("VALUE").text(item.as_str()))),
        };
        call = call.child(XmlElement::new("IPARAMVALUE").attr("NAME", *name).child(value));
    }
    Ok(envelope(message_id, XmlElement::new("SIMPLEREQ").child(call)))
}

/// Builds an extrinsic method call document.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] when a parameter cannot be encoded.
pub fn method_request(
    message_id: u64,
    method: &str,
    path: &CimInstanceName,
    default_namespace: &str,
    params: &[(&str, CimValue)],
) -> Result<String, WbemError> {
    let namespace = path.namespace.as_deref().unwrap_or(default_namespace);
    let target = XmlElement::new("LOCALINSTANCEPATH")
        .child(local_namespace_path(namespace))
        .child(encode_instance_name(path)?);
    let mut call = XmlElement::new("METHODCALL").attr("NAME", method).child(target);
    for (name, value) in params {
        call = call.child(encode_param_value(name, value)?);
    }
    Ok(envelope(message_id, XmlElement::new("SIMPLEREQ").child(call)))
}

/// Builds the response to an export request.
#[must_use]
pub fn export_response(message_id: &str) -> String {
    let response = XmlElement::new("EXPMETHODRESPONSE")
        .attr("NAME", EXPORT_INDICATION)
        .child(XmlElement::new("IRETURNVALUE"));
    let message = XmlElement::new("MESSAGE")
        .attr("ID", message_id)
        .attr("PROTOCOLVERSION", "1.0")
        .child(XmlElement::new("SIMPLEEXPRSP").child(response));
    document(message)
}

/// Builds an export request delivering one indication.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] when the indication cannot be encoded.
pub fn export_request(message_id: u64, indication: &CimInstance) -> Result<String, WbemError> {
    let call = XmlElement::new("EXPMETHODCALL").attr("NAME", EXPORT_INDICATION).child(
        XmlElement::new("EXPPARAMVALUE")
            .attr("NAME", "NewIndication")
            .child(encode_instance(indication)?),
    );
    let message = XmlElement::new("MESSAGE")
        .attr("ID", message_id.to_string())
        .attr("PROTOCOLVERSION", "1.0")
        .child(XmlElement::new("SIMPLEEXPREQ").child(call));
    Ok(document(message))
}

/// Encodes an instance as `<INSTANCE>`.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] when a property value cannot be encoded.
pub fn encode_instance(instance: &CimInstance) -> Result<XmlElement, WbemError> {
    let mut element = XmlElement::new("INSTANCE").attr("CLASSNAME", instance.classname.as_str());
    for prop in instance.properties() {
        element = element.child(encode_property(&prop.name, &prop.value)?);
    }
    Ok(element)
}

/// Encodes an instance name as `<INSTANCENAME>`.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] when a key value cannot be encoded.
pub fn encode_instance_name(path: &CimInstanceName) -> Result<XmlElement, WbemError> {
    let mut element = XmlElement::new("INSTANCENAME").attr("CLASSNAME", path.classname.as_str());
    for (name, value) in &path.keybindings {
        let key = match value {
            CimValue::Reference(target) => encode_reference(target)?,
            other => {
                let text = other.to_wire_string().ok_or_else(|| {
                    WbemError::Protocol(format!("key {name} has no scalar form"))
                })?;
                XmlElement::new("KEYVALUE").attr("VALUETYPE", key_value_type(other)).text(text)
            }
        };
        element = element.child(XmlElement::new("KEYBINDING").attr("NAME", name.as_str()).child(key));
    }
    Ok(element)
}

/// Wraps a message element into a full document.
fn envelope(message_id: u64, body: XmlElement) -> String {
    let message = XmlElement::new("MESSAGE")
        .attr("ID", message_id.to_string())
        .attr("PROTOCOLVERSION", "1.0")
        .child(body);
    document(message)
}

/// Serializes `<CIM>` around a message.
fn document(message: XmlElement) -> String {
    let cim =
        XmlElement::new("CIM").attr("CIMVERSION", "2.0").attr("DTDVERSION", "2.0").child(message);
    format!("{XML_DECL}{}", cim.to_xml())
}

/// Encodes `<LOCALNAMESPACEPATH>` from a slash separated namespace.
fn local_namespace_path(namespace: &str) -> XmlElement {
    XmlElement::new("LOCALNAMESPACEPATH").children(
        namespace
            .split('/')
            .filter(|part| !part.is_empty())
            .map(|part| XmlElement::new("NAMESPACE").attr("NAME", part)),
    )
}

/// Returns the `VALUETYPE` of a key value.
const fn key_value_type(value: &CimValue) -> &'static str {
    match value {
        CimValue::Bool(_) => "boolean",
        CimValue::Uint8(_)
        | CimValue::Sint8(_)
        | CimValue::Uint16(_)
        | CimValue::Sint16(_)
        | CimValue::Uint32(_)
        | CimValue::Sint32(_)
        | CimValue::Uint64(_)
        | CimValue::Sint64(_)
        | CimValue::Real32(_)
        | CimValue::Real64(_) => "numeric",
        _ => "string",
    }
}

/// Encodes `<VALUE.REFERENCE>` choosing the most specific path form.
fn encode_reference(path: &CimInstanceName) -> Result<XmlElement, WbemError> {
    let name = encode_instance_name(path)?;
    let inner = match (&path.host, &path.namespace) {
        (Some(host), Some(namespace)) => XmlElement::new("INSTANCEPATH")
            .child(
                XmlElement::new("NAMESPACEPATH")
                    .child(XmlElement::new("HOST").text(host.as_str()))
                    .child(local_namespace_path(namespace)),
            )
            .child(name),
        (None, Some(namespace)) => {
            XmlElement::new("LOCALINSTANCEPATH").child(local_namespace_path(namespace)).child(name)
        }
        _ => name,
    };
    Ok(XmlElement::new("VALUE.REFERENCE").child(inner))
}

/// Encodes an embedded instance as escaped text inside `<VALUE>`.
fn encode_embedded(instance: &CimInstance) -> Result<XmlElement, WbemError> {
    Ok(XmlElement::new("VALUE").text(encode_instance(instance)?.to_xml()))
}

/// Encodes a scalar or array value element; `None` for nulls.
fn encode_value(value: &CimValue) -> Result<Option<XmlElement>, WbemError> {
    let element = match value {
        CimValue::Null(_) => return Ok(None),
        CimValue::Reference(path) => encode_reference(path)?,
        CimValue::Instance(instance) => encode_embedded(instance)?,
        CimValue::Array(CimType::Reference, items) => {
            let mut array = XmlElement::new("VALUE.REFARRAY");
            for item in items {
                if let CimValue::Reference(path) = item {
                    array = array.child(encode_reference(path)?);
                }
            }
            array
        }
        CimValue::Array(_, items) => {
            let mut array = XmlElement::new("VALUE.ARRAY");
            for item in items {
                let child = match item {
                    CimValue::Instance(instance) => encode_embedded(instance)?,
                    CimValue::Null(_) => XmlElement::new("VALUE.NULL"),
                    scalar => XmlElement::new("VALUE").text(scalar_text(scalar)?),
                };
                array = array.child(child);
            }
            array
        }
        scalar => XmlElement::new("VALUE").text(scalar_text(scalar)?),
    };
    Ok(Some(element))
}

/// Returns scalar wire text or a protocol error.
fn scalar_text(value: &CimValue) -> Result<String, WbemError> {
    value
        .to_wire_string()
        .ok_or_else(|| WbemError::Protocol(format!("value {value} has no scalar form")))
}

/// Encodes a property of an instance.
fn encode_property(name: &str, value: &CimValue) -> Result<XmlElement, WbemError> {
    let kind = value.cim_type();
    let element = match value {
        CimValue::Reference(path) => XmlElement::new("PROPERTY.REFERENCE")
            .attr("NAME", name)
            .attr("REFERENCECLASS", path.classname.as_str()),
        CimValue::Null(CimType::Reference) => XmlElement::new("PROPERTY.REFERENCE").attr("NAME", name),
        CimValue::Array(..) => XmlElement::new("PROPERTY.ARRAY").attr("NAME", name).attr("TYPE", kind.as_str()),
        _ => XmlElement::new("PROPERTY").attr("NAME", name).attr("TYPE", kind.as_str()),
    };
    let element =
        if kind == CimType::Instance { element.attr("EmbeddedObject", "instance") } else { element };
    Ok(match encode_value(value)? {
        Some(child) => element.child(child),
        None => element,
    })
}

/// Encodes a method parameter.
fn encode_param_value(name: &str, value: &CimValue) -> Result<XmlElement, WbemError> {
    let kind = value.cim_type();
    let mut element = XmlElement::new("PARAMVALUE").attr("NAME", name).attr("PARAMTYPE", kind.as_str());
    if kind == CimType::Instance {
        element = element.attr("EmbeddedObject", "instance");
    }
    Ok(match encode_value(value)? {
        Some(child) => element.child(child),
        None => element,
    })
}

// ============================================================================
// SECTION: Response Decoding
// ============================================================================

/// Decodes an intrinsic response and returns its `IRETURNVALUE`, if any.
///
/// # Errors
///
/// Returns [`WbemError::Cim`] for `<ERROR>` and [`WbemError::Protocol`] for
/// malformed documents.
pub fn decode_imethod_response(xml: &str) -> Result<Option<XmlElement>, WbemError> {
    let root = parse_document(xml)?;
    let response = root.require("MESSAGE")?.require("SIMPLERSP")?.require("IMETHODRESPONSE")?;
    check_error(response)?;
    Ok(response.find("IRETURNVALUE").cloned())
}

/// Decodes an extrinsic method response.
///
/// # Errors
///
/// Returns [`WbemError::Cim`] for `<ERROR>` and [`WbemError::Protocol`] for
/// malformed documents.
pub fn decode_method_response(xml: &str) -> Result<MethodResult, WbemError> {
    let root = parse_document(xml)?;
    let response = root.require("MESSAGE")?.require("SIMPLERSP")?.require("METHODRESPONSE")?;
    check_error(response)?;
    let return_value = match response.find("RETURNVALUE") {
        Some(element) => {
            let kind = element.get_attr("PARAMTYPE").and_then(CimType::parse);
            decode_typed(element, Some(kind.unwrap_or(CimType::Uint32)))?
        }
        None => CimValue::Null(CimType::Uint32),
    };
    let mut out_params = Vec::new();
    for param in response.elements_named("PARAMVALUE") {
        out_params.push((param.require_attr("NAME")?.to_string(), decode_typed(param, None)?));
    }
    Ok(MethodResult {
        return_value,
        out_params,
    })
}

/// Decodes an export request carrying indications.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] when the document is not an export request.
pub fn decode_export_request(xml: &str) -> Result<ExportRequest, WbemError> {
    let root = parse_document(xml)?;
    let message = root.require("MESSAGE")?;
    let message_id = message.get_attr("ID").unwrap_or("0").to_string();
    let simple: Vec<&XmlElement> = match message.find("MULTIEXPREQ") {
        Some(multi) => multi.elements_named("SIMPLEEXPREQ").collect(),
        None => vec![message.require("SIMPLEEXPREQ")?],
    };
    let mut indications = Vec::new();
    for request in simple {
        let call = request.require("EXPMETHODCALL")?;
        for param in call.elements_named("EXPPARAMVALUE") {
            for instance in param.elements_named("INSTANCE") {
                indications.push(decode_instance(instance)?);
            }
        }
    }
    Ok(ExportRequest {
        message_id,
        indications,
    })
}

/// Turns an `<ERROR>` child into [`WbemError::Cim`].
fn check_error(response: &XmlElement) -> Result<(), WbemError> {
    let Some(error) = response.find("ERROR") else {
        return Ok(());
    };
    let code = error
        .require_attr("CODE")?
        .trim()
        .parse()
        .map_err(|_| WbemError::Protocol("non-numeric ERROR CODE".to_string()))?;
    Err(WbemError::Cim {
        code,
        description: error.get_attr("DESCRIPTION").unwrap_or_default().to_string(),
    })
}

/// Decodes every `<CLASSNAME>` child.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] when a class name lacks `NAME`.
pub fn decode_class_names(container: &XmlElement) -> Result<Vec<String>, WbemError> {
    container
        .elements_named("CLASSNAME")
        .map(|element| element.require_attr("NAME").map(str::to_string))
        .collect()
}

/// Decodes every instance-path child (`INSTANCENAME`, `INSTANCEPATH`, ...).
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] for malformed paths.
pub fn decode_instance_names(
    container: &XmlElement,
    namespace: &str,
) -> Result<Vec<CimInstanceName>, WbemError> {
    container
        .elements()
        .map(|element| {
            let mut path = decode_instance_name(element)?;
            if path.namespace.is_none() {
                path.namespace = Some(namespace.to_string());
            }
            Ok(path)
        })
        .collect()
}

/// Decodes every object child into instances with paths where present.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] for malformed objects.
pub fn decode_objects(
    container: &XmlElement,
    namespace: &str,
) -> Result<Vec<CimInstance>, WbemError> {
    container.elements().map(|element| decode_object(element, namespace)).collect()
}

/// Decodes one object element.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] for unsupported or malformed elements.
pub fn decode_object(element: &XmlElement, namespace: &str) -> Result<CimInstance, WbemError> {
    let (path_element, instance_element) = match element.name.as_str() {
        "INSTANCE" => (None, element),
        "VALUE.OBJECT" => (None, element.require("INSTANCE")?),
        "VALUE.NAMEDINSTANCE" => {
            (Some(element.require("INSTANCENAME")?), element.require("INSTANCE")?)
        }
        "VALUE.OBJECTWITHPATH" | "VALUE.INSTANCEWITHPATH" | "VALUE.OBJECTWITHLOCALPATH" => {
            let path = element
                .find("INSTANCEPATH")
                .or_else(|| element.find("LOCALINSTANCEPATH"))
                .ok_or_else(|| {
                    WbemError::Protocol(format!("<{}> carries no instance path", element.name))
                })?;
            (Some(path), element.require("INSTANCE")?)
        }
        other => return Err(WbemError::Protocol(format!("unexpected object element <{other}>"))),
    };
    let mut instance = decode_instance(instance_element)?;
    if let Some(path_element) = path_element {
        let mut path = decode_instance_name(path_element)?;
        if path.namespace.is_none() {
            path.namespace = Some(namespace.to_string());
        }
        instance.path = Some(path);
    }
    Ok(instance)
}

/// Decodes any instance path form.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] for unsupported or malformed elements.
pub fn decode_instance_name(element: &XmlElement) -> Result<CimInstanceName, WbemError> {
    match element.name.as_str() {
        "INSTANCENAME" => decode_bare_instance_name(element),
        "LOCALINSTANCEPATH" => {
            let mut path = decode_bare_instance_name(element.require("INSTANCENAME")?)?;
            path.namespace = Some(decode_namespace(element.require("LOCALNAMESPACEPATH")?));
            Ok(path)
        }
        "INSTANCEPATH" => {
            let mut path = decode_bare_instance_name(element.require("INSTANCENAME")?)?;
            let namespace_path = element.require("NAMESPACEPATH")?;
            path.host = namespace_path
                .find("HOST")
                .map(XmlElement::text_content)
                .filter(|host| !host.is_empty());
            path.namespace = Some(decode_namespace(namespace_path.require("LOCALNAMESPACEPATH")?));
            Ok(path)
        }
        "OBJECTPATH" | "VALUE.REFERENCE" => {
            let inner = element.elements().next().ok_or_else(|| {
                WbemError::Protocol(format!("<{}> is empty", element.name))
            })?;
            decode_instance_name(inner)
        }
        other => Err(WbemError::Protocol(format!("unexpected path element <{other}>"))),
    }
}

/// Decodes `<INSTANCE>`.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] for malformed properties.
pub fn decode_instance(element: &XmlElement) -> Result<CimInstance, WbemError> {
    let mut instance = CimInstance::new(element.require_attr("CLASSNAME")?);
    for prop in element.elements() {
        match prop.name.as_str() {
            "PROPERTY" | "PROPERTY.ARRAY" | "PROPERTY.REFERENCE" => {
                let kind = match prop.name.as_str() {
                    "PROPERTY.REFERENCE" => Some(CimType::Reference),
                    _ => prop.get_attr("TYPE").and_then(CimType::parse),
                };
                let value = decode_typed(prop, kind)?;
                instance.set(prop.require_attr("NAME")?, value);
            }
            _ => {}
        }
    }
    Ok(instance)
}

/// Decodes `INSTANCENAME` contents.
fn decode_bare_instance_name(element: &XmlElement) -> Result<CimInstanceName, WbemError> {
    let mut path = CimInstanceName::new(element.require_attr("CLASSNAME")?);
    for binding in element.elements_named("KEYBINDING") {
        let name = binding.require_attr("NAME")?;
        let value = if let Some(key) = binding.find("KEYVALUE") {
            decode_key_value(key)?
        } else {
            CimValue::Reference(decode_instance_name(binding.require("VALUE.REFERENCE")?)?)
        };
        path.keybindings.push((name.to_string(), value));
    }
    Ok(path)
}

/// Decodes `<KEYVALUE>` honoring `TYPE` and `VALUETYPE`.
fn decode_key_value(element: &XmlElement) -> Result<CimValue, WbemError> {
    let text = element.text_content();
    if let Some(kind) = element.get_attr("TYPE").and_then(CimType::parse) {
        return CimValue::parse_scalar(kind, &text);
    }
    match element.get_attr("VALUETYPE").unwrap_or("string") {
        "boolean" => CimValue::parse_scalar(CimType::Boolean, &text),
        "numeric" => {
            let trimmed = text.trim();
            if trimmed.contains(['.', 'e', 'E']) {
                CimValue::parse_scalar(CimType::Real64, trimmed)
            } else if trimmed.starts_with('-') {
                CimValue::parse_scalar(CimType::Sint64, trimmed)
            } else {
                CimValue::parse_scalar(CimType::Uint64, trimmed)
            }
        }
        _ => Ok(CimValue::String(text)),
    }
}

/// Joins `<NAMESPACE NAME=...>` parts with `/`.
fn decode_namespace(element: &XmlElement) -> String {
    element
        .elements_named("NAMESPACE")
        .filter_map(|part| part.get_attr("NAME"))
        .collect::<Vec<_>>()
        .join("/")
}

/// Decodes the value inside a property, parameter, or return value element.
///
/// `kind` overrides the `TYPE`/`PARAMTYPE` attribute when known.
fn decode_typed(holder: &XmlElement, kind: Option<CimType>) -> Result<CimValue, WbemError> {
    let embedded = holder.get_attr("EmbeddedObject").is_some();
    let kind = kind
        .or_else(|| holder.get_attr("PARAMTYPE").and_then(CimType::parse))
        .unwrap_or(CimType::String);
    let kind = if embedded { CimType::Instance } else { kind };
    let Some(value) = holder.elements().find(|element| element.name.starts_with("VALUE")) else {
        return Ok(CimValue::Null(kind));
    };
    match value.name.as_str() {
        "VALUE" => decode_scalar(value, kind),
        "VALUE.NULL" => Ok(CimValue::Null(kind)),
        "VALUE.REFERENCE" => Ok(CimValue::Reference(decode_instance_name(value)?)),
        "VALUE.ARRAY" => {
            let mut items = Vec::new();
            for item in value.elements() {
                items.push(match item.name.as_str() {
                    "VALUE.NULL" => CimValue::Null(kind),
                    _ => decode_scalar(item, kind)?,
                });
            }
            Ok(CimValue::Array(kind, items))
        }
        "VALUE.REFARRAY" => {
            let mut items = Vec::new();
            for item in value.elements() {
                items.push(match item.name.as_str() {
                    "VALUE.NULL" => CimValue::Null(CimType::Reference),
                    _ => CimValue::Reference(decode_instance_name(item)?),
                });
            }
            Ok(CimValue::Array(CimType::Reference, items))
        }
        other => Err(WbemError::Protocol(format!("unexpected value element <{other}>"))),
    }
}

/// Decodes one `<VALUE>`; string values holding an instance are unpacked.
fn decode_scalar(value: &XmlElement, kind: CimType) -> Result<CimValue, WbemError> {
    if let Some(instance) = value.find("INSTANCE") {
        return Ok(CimValue::Instance(Box::new(decode_instance(instance)?)));
    }
    let text = value.text_content();
    let looks_embedded = kind == CimType::String && text.trim_start().starts_with("<INSTANCE");
    if kind == CimType::Instance || looks_embedded {
        if text.trim().is_empty() {
            return Ok(CimValue::Null(CimType::Instance));
        }
        let root = parse_document(&text)?;
        let instance = match root.name.as_str() {
            "INSTANCE" => decode_instance(&root)?,
            _ => decode_object(&root, "")?,
        };
        return Ok(CimValue::Instance(Box::new(instance)));
    }
    if kind == CimType::Reference {
        return Err(WbemError::Protocol("reference carried as plain VALUE".to_string()));
    }
    CimValue::parse_scalar(kind, &text)
}
