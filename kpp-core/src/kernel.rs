//! Kernel and argument records, and the strings derived from them for
//! the jit dispatch code.

use std::fmt;

/// Base types recognized in kernel argument lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Char,
    Int,
    Short,
    Unsigned,
    Long,
    Bool,
    Float,
    Double,
    SizeT,
}

impl BaseType {
    pub fn from_ident(ident: &str) -> Option<Self> {
        let ty = match ident {
            "char" => BaseType::Char,
            "int" => BaseType::Int,
            "short" => BaseType::Short,
            "unsigned" => BaseType::Unsigned,
            "long" => BaseType::Long,
            "bool" => BaseType::Bool,
            "float" => BaseType::Float,
            "double" => BaseType::Double,
            "size_t" => BaseType::SizeT,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::Char => "char",
            BaseType::Int => "int",
            BaseType::Short => "short",
            BaseType::Unsigned => "unsigned",
            BaseType::Long => "long",
            BaseType::Bool => "bool",
            BaseType::Float => "float",
            BaseType::Double => "double",
            BaseType::SizeT => "size_t",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared kernel parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Argument {
    /// Last base type seen, so `unsigned long` records `long`.
    pub ty: Option<BaseType>,
    pub name: String,
    pub pointer: bool,
    pub is_const: bool,
    pub restrict: bool,
}

impl Argument {
    pub fn type_name(&self) -> &'static str {
        self.ty.map(BaseType::as_str).unwrap_or("")
    }

    /// Non-pointer const parameters specialize the jit kernel.
    pub fn is_static(&self) -> bool {
        self.is_const && !self.pointer
    }

    fn is_double(&self) -> bool {
        self.ty == Some(BaseType::Double)
    }
}

/// Text fragments spliced into the jit prefix and postfix.
///
/// The three static lists hold one field per static argument and the two
/// pointer lists one field per pointer argument, all in parameter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitStrings {
    /// printf-style specifiers, filled in by the runtime compiler.
    pub static_format: String,
    /// Host-side values of the static arguments (bit views for doubles).
    pub static_args: String,
    /// Template parameter declarations of the embedded kernel.
    pub static_template: String,
    pub pointer_params: String,
    pub pointer_args: String,
    /// Host statements turning each static double into its `uint64_t` view.
    pub pack_doubles: String,
    /// Kernel statements turning each `uint64_t` template value back into
    /// a double.
    pub unpack_doubles: String,
}

/// A kernel declaration being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Kernel {
    pub name: String,
    /// Marked `__jit` with jit generation enabled.
    pub deferred: bool,
    pub arguments: Vec<Argument>,
    /// Values listed by `__template` directives, in order. Parsed and
    /// validated only; the generated code does not use them yet.
    pub template_range: Vec<u32>,
    pub strings: JitStrings,
}

impl Kernel {
    pub fn new(deferred: bool) -> Self {
        Self {
            deferred,
            ..Self::default()
        }
    }

    pub fn static_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|arg| arg.is_static())
    }

    pub fn pointer_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|arg| arg.pointer)
    }

    /// Builds the jit fragments from the argument list. `handle_marker`
    /// prefixes pointer parameter names that carry memory-manager handles.
    pub fn jit_strings(&self, handle_marker: &str) -> JitStrings {
        let mut format = Vec::new();
        let mut args = Vec::new();
        let mut template = Vec::new();
        let mut pack = String::new();
        let mut unpack = String::new();

        for arg in self.static_arguments() {
            let name = &arg.name;
            if arg.is_double() {
                format.push("0x%lx".to_string());
                args.push(format!("u{name}"));
                template.push(format!("const uint64_t t{name}"));
                unpack.push_str(&format!("const double {name} = (union_du){{u:t{name}}}.d;"));
                pack.push_str(&format!("const uint64_t u{name} = (union_du){{{name}}}.u;"));
            } else {
                format.push("%ld".to_string());
                args.push(name.clone());
                template.push(format!("const {} {name}", arg.type_name()));
            }
        }

        let mut params = Vec::new();
        let mut pointers = Vec::new();
        for arg in self.pointer_arguments() {
            let qualifier = if arg.is_const { "const " } else { "" };
            params.push(format!(
                "{qualifier}{} *{handle_marker}{}",
                arg.type_name(),
                arg.name
            ));
            pointers.push(arg.name.clone());
        }

        JitStrings {
            static_format: format.join(","),
            static_args: args.join(","),
            static_template: template.join(","),
            pointer_params: params.join(","),
            pointer_args: pointers.join(","),
            pack_doubles: pack,
            unpack_doubles: unpack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(ty: BaseType, name: &str, pointer: bool, is_const: bool) -> Argument {
        Argument {
            ty: Some(ty),
            name: name.to_string(),
            pointer,
            is_const,
            restrict: false,
        }
    }

    fn sample() -> Kernel {
        Kernel {
            name: "axpy".to_string(),
            deferred: true,
            arguments: vec![
                arg(BaseType::Int, "n", false, true),
                arg(BaseType::Double, "alpha", false, true),
                arg(BaseType::Double, "x", true, true),
                arg(BaseType::Double, "y", true, false),
                arg(BaseType::Int, "scratch", false, false),
            ],
            ..Kernel::default()
        }
    }

    #[test]
    fn base_types_round_trip_through_names() {
        for name in ["char", "int", "short", "unsigned", "long", "bool", "float", "double", "size_t"] {
            let ty = BaseType::from_ident(name).expect("known type");
            assert_eq!(ty.to_string(), name);
        }
        assert_eq!(BaseType::from_ident("void"), None);
    }

    #[test]
    fn static_lists_stay_aligned() {
        let strings = sample().jit_strings("");
        assert_eq!(strings.static_format, "%ld,0x%lx");
        assert_eq!(strings.static_args, "n,ualpha");
        assert_eq!(strings.static_template, "const int n,const uint64_t talpha");
        let fields = |s: &str| s.split(',').count();
        assert_eq!(fields(&strings.static_format), 2);
        assert_eq!(fields(&strings.static_args), 2);
        assert_eq!(fields(&strings.static_template), 2);
    }

    #[test]
    fn pointer_lists_follow_parameter_order() {
        let strings = sample().jit_strings("_");
        assert_eq!(strings.pointer_params, "const double *_x,double *_y");
        assert_eq!(strings.pointer_args, "x,y");
    }

    #[test]
    fn doubles_are_reinterpreted_not_cast() {
        let strings = sample().jit_strings("");
        assert_eq!(
            strings.pack_doubles,
            "const uint64_t ualpha = (union_du){alpha}.u;"
        );
        assert_eq!(
            strings.unpack_doubles,
            "const double alpha = (union_du){u:talpha}.d;"
        );
    }

    #[test]
    fn kernel_without_arguments_has_empty_strings() {
        assert_eq!(Kernel::new(true).jit_strings("_"), JitStrings::default());
    }
}
