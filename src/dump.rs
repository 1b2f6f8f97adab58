//! Format message handles and field values as indented text.

use crate::field::Bundle;
use crate::handle::MessageHandle;
use crate::value::Value;

/// Raw scalar string.
pub fn format_scalar_raw(v: &Value) -> String {
    match v {
        Value::U8(x) => format!("{}", x),
        Value::U16(x) => format!("{}", x),
        Value::U32(x) => format!("{}", x),
        Value::U64(x) => format!("{}", x),
        Value::I8(x) => format!("{}", x),
        Value::I16(x) => format!("{}", x),
        Value::I32(x) => format!("{}", x),
        Value::I64(x) => format!("{}", x),
        Value::Float(x) => format!("{}", x),
        Value::Double(x) => format!("{}", x),
        Value::String(s) => format!("{:?}", s),
        _ => format!("{:?}", v),
    }
}

pub fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Format a value for display, multi-line for compound values.
pub fn value_to_dump(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Bytes(b) => format!("{}hex({})", pad, hex_string(b)),
        Value::Struct(m) => {
            let mut lines: Vec<String> = vec![format!("{}struct {{", pad)];
            for (k, val) in m {
                let sub = value_to_dump(val, indent + 1);
                lines.push(format!("{}  {}: {}", pad, k, sub.trim_start()));
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        Value::List(lst) => {
            if lst.is_empty() {
                format!("{}[]", pad)
            } else if lst.len() == 1 {
                value_to_dump(&lst[0], indent)
            } else {
                let mut lines: Vec<String> = vec![format!("{}[", pad)];
                for (i, item) in lst.iter().enumerate() {
                    let sub = value_to_dump(item, indent + 1);
                    lines.push(format!("{}  [{}] {}", pad, i, sub.trim_start()));
                }
                lines.push(format!("{}]", pad));
                lines.join("\n")
            }
        }
        _ => format!("{}{}", pad, format_scalar_raw(v)),
    }
}

/// First line of [`value_to_dump`].
pub fn value_summary_line(v: &Value) -> String {
    let full = value_to_dump(v, 0);
    full.lines().next().map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Members of `fields` in wire order, one `name: value` entry each.
pub fn fields_to_dump(fields: &Bundle, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    fields
        .iter()
        .map(|(name, field)| {
            let sub = value_to_dump(&field.value(), indent + 1);
            format!("{}{}: {}", pad, name, sub.trim_start())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full text dump of a handle: header line, fields, then the side annotations.
pub fn dump_message(handle: &MessageHandle) -> String {
    let msg = handle.message();
    let mut header = format!("{} (id {})", msg.name(), msg.id_as_string());
    if !handle.is_valid() {
        header.push_str(" INVALID");
    }
    let mut lines = vec![header];
    if !msg.fields().is_empty() {
        lines.push(fields_to_dump(msg.fields(), 1));
    }
    if let Some(raw) = handle.raw_bytes() {
        lines.push(format!("  raw: hex({})", hex_string(raw)));
    }
    if let Some(transport) = handle.transport() {
        lines.push("  transport:".to_string());
        lines.push(fields_to_dump(transport.fields(), 2));
    }
    if let Some(doc) = handle.extra_info_document() {
        lines.push("  extra:".to_string());
        lines.extend(doc.lines().map(|l| format!("    {}", l)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_and_bytes() {
        assert_eq!(value_to_dump(&Value::I16(-3), 0), "-3");
        assert_eq!(value_to_dump(&Value::Bytes(vec![0xab, 0x01]), 1), "  hex(ab 01)");
        assert_eq!(value_summary_line(&Value::String("hi".into())), "\"hi\"");
    }

    #[test]
    fn struct_members_in_field_order() {
        let m = vec![("b".to_string(), Value::U8(2)), ("a".to_string(), Value::U8(1))];
        assert_eq!(value_to_dump(&Value::Struct(m), 0), "struct {\n  b: 2\n  a: 1\n}");
    }

    #[test]
    fn lists() {
        assert_eq!(value_to_dump(&Value::List(vec![]), 0), "[]");
        assert_eq!(value_to_dump(&Value::List(vec![Value::U8(7)]), 0), "7");
        assert_eq!(
            value_to_dump(&Value::List(vec![Value::U8(1), Value::U8(2)]), 0),
            "[\n  [0] 1\n  [1] 2\n]"
        );
    }
}
