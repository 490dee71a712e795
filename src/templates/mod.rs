//! Static language catalog: default templates, file extensions and the
//! runtime versions the execution service expects.

use serde::Serialize;

/// One entry of the language catalog.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSpec {
    pub language: &'static str,
    pub label: &'static str,
    pub extension: &'static str,
    pub template: &'static str,
    /// Runtime version for the execution service. `None` for markup languages
    /// that cannot be run.
    pub execution_version: Option<&'static str>,
    pub icon: &'static str,
}

/// Extension used for languages missing from the catalog.
pub const FALLBACK_EXTENSION: &str = "txt";

pub const LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec {
        language: "javascript",
        label: "JavaScript",
        extension: "js",
        template: javascript_template(),
        execution_version: Some("18.15.0"),
        icon: "/icons/javascript.svg",
    },
    LanguageSpec {
        language: "python",
        label: "Python",
        extension: "py",
        template: python_template(),
        execution_version: Some("3.10.0"),
        icon: "/icons/python.svg",
    },
    LanguageSpec {
        language: "html",
        label: "HTML",
        extension: "html",
        template: html_template(),
        execution_version: None,
        icon: "/icons/html.svg",
    },
    LanguageSpec {
        language: "css",
        label: "CSS",
        extension: "css",
        template: css_template(),
        execution_version: None,
        icon: "/icons/css.svg",
    },
    LanguageSpec {
        language: "java",
        label: "Java",
        extension: "java",
        template: java_template(),
        execution_version: Some("15.0.2"),
        icon: "/icons/java.svg",
    },
    LanguageSpec {
        language: "cpp",
        label: "C++",
        extension: "cpp",
        template: cpp_template(),
        execution_version: Some("10.2.0"),
        icon: "/icons/cpp.svg",
    },
    LanguageSpec {
        language: "php",
        label: "PHP",
        extension: "php",
        template: php_template(),
        execution_version: Some("8.2.3"),
        icon: "/icons/php.svg",
    },
    LanguageSpec {
        language: "rust",
        label: "Rust",
        extension: "rs",
        template: rust_template(),
        execution_version: Some("1.68.2"),
        icon: "/icons/rust.svg",
    },
    LanguageSpec {
        language: "sql",
        label: "SQL",
        extension: "sql",
        template: sql_template(),
        execution_version: Some("3.36.0"),
        icon: "/icons/sql.svg",
    },
    LanguageSpec {
        language: "xml",
        label: "XML",
        extension: "xml",
        template: xml_template(),
        execution_version: None,
        icon: "/icons/xml.svg",
    },
];

/// Look up a language by its identifier.
pub fn find(language: &str) -> Option<&'static LanguageSpec> {
    LANGUAGES.iter().find(|lang| lang.language == language)
}

/// Look up a language by file extension (without the dot, case-insensitive).
pub fn find_by_extension(extension: &str) -> Option<&'static LanguageSpec> {
    LANGUAGES
        .iter()
        .find(|lang| lang.extension.eq_ignore_ascii_case(extension))
}

/// Default template for a language; empty for unknown languages.
pub fn default_template(language: &str) -> &'static str {
    find(language).map(|lang| lang.template).unwrap_or("")
}

/// File extension for a language, falling back to `txt`.
pub fn extension_for(language: &str) -> &'static str {
    find(language)
        .map(|lang| lang.extension)
        .unwrap_or(FALLBACK_EXTENSION)
}

const fn javascript_template() -> &'static str {
    r#"// JavaScript
console.log("Hello, World!");
"#
}

const fn python_template() -> &'static str {
    r#"# Python
print("Hello, World!")
"#
}

const fn html_template() -> &'static str {
    r#"<!DOCTYPE html>
<html>
  <head>
    <title>Codepad</title>
  </head>
  <body>
    <h1>Hello, World!</h1>
  </body>
</html>
"#
}

const fn css_template() -> &'static str {
    r#"body {
  font-family: sans-serif;
}
"#
}

const fn java_template() -> &'static str {
    r#"public class Main {
    public static void main(String[] args) {
        System.out.println("Hello, World!");
    }
}
"#
}

const fn cpp_template() -> &'static str {
    r#"#include <iostream>

int main() {
    std::cout << "Hello, World!" << std::endl;
    return 0;
}
"#
}

const fn php_template() -> &'static str {
    r#"<?php
echo "Hello, World!";
"#
}

const fn rust_template() -> &'static str {
    r#"fn main() {
    println!("Hello, World!");
}
"#
}

const fn sql_template() -> &'static str {
    r#"SELECT 'Hello, World!';
"#
}

const fn xml_template() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<greeting>Hello, World!</greeting>
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_language_and_extension() {
        assert_eq!(find("python").unwrap().extension, "py");
        assert_eq!(find_by_extension("rs").unwrap().language, "rust");
        assert_eq!(find_by_extension("JS").unwrap().language, "javascript");
        assert!(find("cobol").is_none());
    }

    #[test]
    fn test_fallbacks_for_unknown_language() {
        assert_eq!(extension_for("cobol"), "txt");
        assert_eq!(default_template("cobol"), "");
        assert!(default_template("python").contains("print"));
    }

    #[test]
    fn test_markup_languages_are_not_executable() {
        for language in ["html", "css", "xml"] {
            assert!(find(language).unwrap().execution_version.is_none());
        }
        assert!(find("java").unwrap().execution_version.is_some());
    }
}
