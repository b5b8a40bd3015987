use serde::{Deserialize, Serialize};
use shroud_utils::errors::ConfigError;
use std::fmt;
use std::str::FromStr;

/// The namespaces PHP keeps identifiers in. Each category gets its own scrambler, its own
/// case rule and its own reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCategory {
    Variable,
    Function,
    Class,
    Interface,
    Trait,
    Namespace,
    Property,
    Method,
    Constant,
    ClassConstant,
    Label,
}

impl IdentifierCategory {
    pub const ALL: [Self; 11] = [
        Self::Variable,
        Self::Function,
        Self::Class,
        Self::Interface,
        Self::Trait,
        Self::Namespace,
        Self::Property,
        Self::Method,
        Self::Constant,
        Self::ClassConstant,
        Self::Label,
    ];

    /// Position of the category in [`Self::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Namespace => "namespace",
            Self::Property => "property",
            Self::Method => "method",
            Self::Constant => "constant",
            Self::ClassConstant => "class_constant",
            Self::Label => "label",
        }
    }

    /// PHP resolves functions, class-likes, namespaces and methods case-insensitively.
    pub const fn is_case_sensitive(self) -> bool {
        !matches!(
            self,
            Self::Function
                | Self::Class
                | Self::Interface
                | Self::Trait
                | Self::Namespace
                | Self::Method
        )
    }

    /// Classes, interfaces and traits share one symbol table.
    pub const fn is_class_like(self) -> bool {
        matches!(self, Self::Class | Self::Interface | Self::Trait)
    }

    /// Normalises `name` to the form used as a map key in this category.
    pub fn fold(self, name: &str) -> String {
        if self.is_case_sensitive() {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }

    /// Names that must never be renamed in this category.
    pub fn is_reserved(self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        match self {
            Self::Variable => SPECIAL_VARIABLES.contains(&name),
            Self::Property => false,
            Self::Method => {
                MAGIC_METHODS.contains(&lower.as_str())
                    || BUILTIN_INTERFACE_METHODS.contains(&lower.as_str())
            }
            Self::Function | Self::Class | Self::Interface | Self::Trait | Self::Namespace => {
                is_keyword(&lower) || BUILTIN_TYPES.contains(&lower.as_str())
            }
            Self::Constant => {
                is_keyword(&lower)
                    || matches!(lower.as_str(), "true" | "false" | "null")
                    || MAGIC_CONSTANTS.contains(&name)
            }
            Self::ClassConstant => lower == "class",
            Self::Label => is_keyword(&lower),
        }
    }
}

impl fmt::Display for IdentifierCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownCategory(s.to_string()))
    }
}

/// True when `lower` (already lowercased) is a PHP keyword.
pub fn is_keyword(lower: &str) -> bool {
    KEYWORDS.contains(&lower)
}

const KEYWORDS: &[&str] = &[
    "__halt_compiler",
    "abstract",
    "and",
    "array",
    "as",
    "break",
    "callable",
    "case",
    "catch",
    "class",
    "clone",
    "const",
    "continue",
    "declare",
    "default",
    "die",
    "do",
    "echo",
    "else",
    "elseif",
    "empty",
    "enddeclare",
    "endfor",
    "endforeach",
    "endif",
    "endswitch",
    "endwhile",
    "enum",
    "eval",
    "exit",
    "extends",
    "final",
    "finally",
    "fn",
    "for",
    "foreach",
    "function",
    "global",
    "goto",
    "if",
    "implements",
    "include",
    "include_once",
    "instanceof",
    "insteadof",
    "interface",
    "isset",
    "list",
    "match",
    "namespace",
    "new",
    "or",
    "print",
    "private",
    "protected",
    "public",
    "readonly",
    "require",
    "require_once",
    "return",
    "static",
    "switch",
    "throw",
    "trait",
    "try",
    "unset",
    "use",
    "var",
    "while",
    "xor",
    "yield",
];

const BUILTIN_TYPES: &[&str] = &[
    "bool", "false", "float", "int", "iterable", "mixed", "never", "null", "numeric",
    "object", "parent", "resource", "self", "string", "true", "void",
];

const SPECIAL_VARIABLES: &[&str] = &[
    "this",
    "GLOBALS",
    "_SERVER",
    "_GET",
    "_POST",
    "_FILES",
    "_COOKIE",
    "_SESSION",
    "_REQUEST",
    "_ENV",
    "http_response_header",
    "argc",
    "argv",
    "php_errormsg",
];

const MAGIC_METHODS: &[&str] = &[
    "__construct",
    "__destruct",
    "__call",
    "__callstatic",
    "__get",
    "__set",
    "__isset",
    "__unset",
    "__sleep",
    "__wakeup",
    "__serialize",
    "__unserialize",
    "__tostring",
    "__invoke",
    "__set_state",
    "__clone",
    "__debuginfo",
];

/// Methods the engine calls through built-in interfaces (`ArrayAccess`, `Iterator`,
/// `IteratorAggregate`, `Countable`, `JsonSerializable`, `Serializable`, `Stringable`).
const BUILTIN_INTERFACE_METHODS: &[&str] = &[
    "count",
    "current",
    "getiterator",
    "jsonserialize",
    "key",
    "next",
    "offsetexists",
    "offsetget",
    "offsetset",
    "offsetunset",
    "rewind",
    "serialize",
    "unserialize",
    "valid",
];

const MAGIC_CONSTANTS: &[&str] = &[
    "__CLASS__",
    "__DIR__",
    "__FILE__",
    "__FUNCTION__",
    "__LINE__",
    "__METHOD__",
    "__NAMESPACE__",
    "__TRAIT__",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_rules() {
        assert!(IdentifierCategory::Variable.is_case_sensitive());
        assert!(IdentifierCategory::Constant.is_case_sensitive());
        assert!(!IdentifierCategory::Function.is_case_sensitive());
        assert!(!IdentifierCategory::Method.is_case_sensitive());
        assert_eq!(IdentifierCategory::Class.fold("FooBar"), "foobar");
        assert_eq!(IdentifierCategory::Property.fold("FooBar"), "FooBar");
    }

    #[test]
    fn test_reserved_words_per_category() {
        assert!(IdentifierCategory::Variable.is_reserved("this"));
        assert!(IdentifierCategory::Variable.is_reserved("_POST"));
        assert!(!IdentifierCategory::Variable.is_reserved("list"));
        assert!(IdentifierCategory::Method.is_reserved("__toString"));
        assert!(IdentifierCategory::Class.is_reserved("Self"));
        assert!(IdentifierCategory::ClassConstant.is_reserved("class"));
        assert!(IdentifierCategory::Constant.is_reserved("NULL"));
        assert!(!IdentifierCategory::Constant.is_reserved("MY_FLAG"));
    }

    #[test]
    fn test_builtin_interface_methods_reserved() {
        for name in ["offsetGet", "OFFSETSET", "getIterator", "count", "jsonSerialize", "valid"] {
            assert!(IdentifierCategory::Method.is_reserved(name), "{name}");
        }
        assert!(!IdentifierCategory::Method.is_reserved("render"));
        assert!(!IdentifierCategory::Function.is_reserved("count"));
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, category) in IdentifierCategory::ALL.into_iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_parse_category_names() {
        assert_eq!(
            "class_constant".parse::<IdentifierCategory>().unwrap(),
            IdentifierCategory::ClassConstant
        );
        assert!(matches!(
            "widget".parse::<IdentifierCategory>(),
            Err(ConfigError::UnknownCategory(_))
        ));
    }
}
