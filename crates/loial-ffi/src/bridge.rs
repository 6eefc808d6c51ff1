//! C bridge (trampoline) generation.
//!
//! Every artifact exports, next to the user's function, a bridge with one
//! uniform signature:
//!
//! ```c
//! void loial_bridge_<symbol>(void **args, const int *tags, void *ret);
//! const int loial_meta_<symbol>[2]; /* { arity, returns_value } */
//! ```
//!
//! `args[i]` points at the marshalled slot for parameter `i` and `tags[i]`
//! says what the slot holds: a [`NativeType`] tag for scalars passed by
//! value, [`TAG_ADDRESS`] for an address, or [`TAG_RECORD`] for struct bytes.
//! The bridge converts each slot to the C parameter type, calls the target
//! and stores the result in `ret` as the return hint's type.

use loial_core::{NativeType, TypeHint};

use crate::csig::{CCategory, CSignature, CType};

/// Slot holds an address (`void *`).
pub const TAG_ADDRESS: i32 = 64;
/// Slot holds the bytes of a struct passed by value.
pub const TAG_RECORD: i32 = 65;

pub fn bridge_symbol(symbol: &str) -> String {
    format!("loial_bridge_{symbol}")
}

pub fn meta_symbol(symbol: &str) -> String {
    format!("loial_meta_{symbol}")
}

/// C spelling used to read or store a native type in a bridge slot.
fn slot_type(ty: NativeType) -> &'static str {
    match ty {
        // `ssize_t` needs <sys/types.h>; `ptrdiff_t` has the same width.
        NativeType::SSizeT => "ptrdiff_t",
        // Values travel as double and are widened by the C conversion.
        NativeType::LongDouble => "double",
        ty => ty.c_name(),
    }
}

/// Native types that can sit in a by-value slot under their own tag.
fn scalar_tags() -> impl Iterator<Item = NativeType> {
    NativeType::ALL
        .into_iter()
        .filter(|ty| !ty.is_pointer() && *ty != NativeType::LongDouble)
}

/// Includes, export macro and the slot conversion helpers.
pub fn prelude() -> String {
    let mut text = String::new();
    text.push_str("#ifndef LOIAL_BRIDGE_PRELUDE\n#define LOIAL_BRIDGE_PRELUDE\n");
    text.push_str("#include <stddef.h>\n#include <stdint.h>\n#include <wchar.h>\n\n");
    text.push_str("#if defined(_WIN32)\n#define LOIAL_EXPORT __declspec(dllexport)\n");
    text.push_str("#else\n#define LOIAL_EXPORT __attribute__((visibility(\"default\")))\n#endif\n\n");
    text.push_str(&format!("#define LOIAL_TAG_ADDRESS {TAG_ADDRESS}\n"));
    text.push_str(&format!("#define LOIAL_TAG_RECORD {TAG_RECORD}\n\n"));

    for (name, result) in [("loial_int", "long long"), ("loial_real", "long double")] {
        text.push_str(&format!(
            "static inline {result} {name}(void *slot, int tag)\n{{\n\tswitch (tag) {{\n"
        ));
        for ty in scalar_tags() {
            text.push_str(&format!(
                "\tcase {}: return ({result})*({} *)slot;\n",
                ty.tag(),
                slot_type(ty)
            ));
        }
        text.push_str(&format!(
            "\tcase LOIAL_TAG_ADDRESS: return ({result})(intptr_t)*(void **)slot;\n"
        ));
        text.push_str("\t}\n\treturn 0;\n}\n\n");
    }

    text.push_str("static inline void *loial_ptr(void *slot, int tag)\n{\n\tswitch (tag) {\n");
    text.push_str("\tcase LOIAL_TAG_ADDRESS: return *(void **)slot;\n");
    text.push_str("\tcase LOIAL_TAG_RECORD: return slot;\n");
    text.push_str("\t}\n\treturn (void *)(intptr_t)loial_int(slot, tag);\n}\n");
    text.push_str("#endif\n");
    text
}

/// Expression converting slot `index` to a C parameter of type `ty`.
fn argument(index: usize, ty: &CType) -> String {
    match ty.category() {
        CCategory::Integer => format!("({ty})loial_int(args[{index}], tags[{index}])"),
        CCategory::Real => format!("({ty})loial_real(args[{index}], tags[{index}])"),
        CCategory::Pointer => format!("({ty})loial_ptr(args[{index}], tags[{index}])"),
        CCategory::Aggregate | CCategory::Void => format!("*({ty} *)args[{index}]"),
    }
}

/// Statement calling the target and storing its result; the flag says
/// whether anything was stored.
fn result_statement(signature: &CSignature, call: &str, hint: Option<&TypeHint>) -> (String, bool) {
    let category = signature.return_type.category();
    match (category, hint) {
        (CCategory::Void, _) => (format!("{call};"), false),
        (_, Some(TypeHint::Struct(def))) => {
            (format!("*({} *)ret = {call};", def.name()), true)
        }
        (CCategory::Aggregate, None) => (format!("{call};"), false),
        (category, hint) => {
            let target = match hint {
                Some(TypeHint::Native(ty)) => *ty,
                _ => NativeType::Int,
            };
            let store = slot_type(target);
            let cast = if category == CCategory::Pointer || target.is_pointer() {
                format!("({store})(intptr_t)")
            } else {
                format!("({store})")
            };
            (format!("*({store} *)ret = {cast}{call};"), true)
        }
    }
}

/// Render the bridge and metadata for `signature`.
///
/// With `declare`, a prototype is emitted first for targets defined in
/// another translation unit.
pub fn generate_bridge(signature: &CSignature, hint: Option<&TypeHint>, declare: bool) -> String {
    let symbol = &signature.name;
    let arguments: Vec<String> = signature
        .parameters
        .iter()
        .enumerate()
        .map(|(i, p)| argument(i, &p.param_type))
        .collect();
    let call = format!("{symbol}({})", arguments.join(", "));
    let (statement, returns) = result_statement(signature, &call, hint);

    let mut text = String::new();
    if declare {
        text.push_str(&format!("{signature};\n\n"));
    }
    text.push_str(&format!(
        "LOIAL_EXPORT const int {}[2] = {{ {}, {} }};\n\n",
        meta_symbol(symbol),
        signature.arity(),
        i32::from(returns)
    ));
    text.push_str(&format!(
        "LOIAL_EXPORT void {}(void **args, const int *tags, void *ret)\n{{\n",
        bridge_symbol(symbol)
    ));
    text.push_str("\t(void)args;\n\t(void)tags;\n\t(void)ret;\n");
    text.push_str(&format!("\t{statement}\n}}\n"));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use loial_core::StructDef;

    fn sig(text: &str) -> CSignature {
        CSignature::parse(text).unwrap()
    }

    #[test]
    fn prelude_covers_every_scalar_tag() {
        let text = prelude();
        for ty in scalar_tags() {
            assert!(text.contains(&format!("case {}: return (long long)", ty.tag())));
        }
        assert!(text.contains("case 14: return (long long)*(ptrdiff_t *)slot;"));
        assert!(!text.contains("*(ssize_t *)"));
        assert!(text.contains("__declspec(dllexport)"));
        assert!(text.contains("#define LOIAL_TAG_ADDRESS 64"));
    }

    #[test]
    fn arguments_follow_parameter_categories() {
        let text = generate_bridge(
            &sig("int fun(short a, float b, const char *s, Record r)"),
            None,
            false,
        );
        assert!(text.contains("(short)loial_int(args[0], tags[0])"));
        assert!(text.contains("(float)loial_real(args[1], tags[1])"));
        assert!(text.contains("(const char*)loial_ptr(args[2], tags[2])"));
        assert!(text.contains("*(Record *)args[3]"));
        assert!(text.contains("loial_meta_fun[2] = { 4, 1 }"));
        assert!(text.contains("*(int *)ret = (int)fun("));
    }

    #[test]
    fn return_hint_drives_the_store() {
        let text = generate_bridge(
            &sig("float freturn(int a)"),
            Some(&TypeHint::Native(NativeType::Float)),
            false,
        );
        assert!(text.contains("*(float *)ret = (float)freturn("));

        let text = generate_bridge(
            &sig("int *where(void)"),
            Some(&TypeHint::Native(NativeType::VoidPtr)),
            false,
        );
        assert!(text.contains("*(void * *)ret = (void *)(intptr_t)where()"));

        let text = generate_bridge(
            &sig("long double wide(void)"),
            Some(&TypeHint::Native(NativeType::LongDouble)),
            false,
        );
        assert!(text.contains("*(double *)ret = (double)wide()"));
    }

    #[test]
    fn void_and_unhinted_struct_returns_store_nothing() {
        let text = generate_bridge(&sig("void bump(Record *r)"), None, false);
        assert!(text.contains("\tbump((Record*)loial_ptr(args[0], tags[0]));"));
        assert!(text.contains("{ 1, 0 }"));

        let text = generate_bridge(&sig("struct pair make(void)"), None, false);
        assert!(text.contains("\tmake();"));
        assert!(text.contains("{ 0, 0 }"));
    }

    #[test]
    fn struct_hint_stores_the_struct() {
        let hint = TypeHint::from(StructDef::new("Pair").field("a", NativeType::Int));
        let text = generate_bridge(&sig("Pair make(int a)"), Some(&hint), false);
        assert!(text.contains("*(Pair *)ret = make("));
    }

    #[test]
    fn prototype_is_declared_on_request() {
        let text = generate_bridge(&sig("int ext(int a)"), None, true);
        assert!(text.starts_with("int ext(int a);\n"));
    }
}
