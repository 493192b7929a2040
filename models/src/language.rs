use serde::{Deserialize, Serialize};

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Analyzer language keys understood by the backend.
///
/// Serialized in upper case (`"JS"`, `"CPP"`, `"SECRETS"`), which is also the
/// spelling accepted in `sloop.toml`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    C,
    Cpp,
    Cs,
    Css,
    Go,
    Html,
    Ipython,
    Java,
    Js,
    Kotlin,
    Php,
    Python,
    Ruby,
    Scala,
    Secrets,
    Ts,
    Vbnet,
    Xml,
    Yaml,
    Json,
    Docker,
    Terraform,
    CloudFormation,
    Kubernetes,
    Tsql,
    Plsql,
}

impl Language {
    pub const fn key(self) -> &'static str {
        match self {
            Language::C => "C",
            Language::Cpp => "CPP",
            Language::Cs => "CS",
            Language::Css => "CSS",
            Language::Go => "GO",
            Language::Html => "HTML",
            Language::Ipython => "IPYTHON",
            Language::Java => "JAVA",
            Language::Js => "JS",
            Language::Kotlin => "KOTLIN",
            Language::Php => "PHP",
            Language::Python => "PYTHON",
            Language::Ruby => "RUBY",
            Language::Scala => "SCALA",
            Language::Secrets => "SECRETS",
            Language::Ts => "TS",
            Language::Vbnet => "VBNET",
            Language::Xml => "XML",
            Language::Yaml => "YAML",
            Language::Json => "JSON",
            Language::Docker => "DOCKER",
            Language::Terraform => "TERRAFORM",
            Language::CloudFormation => "CLOUDFORMATION",
            Language::Kubernetes => "KUBERNETES",
            Language::Tsql => "TSQL",
            Language::Plsql => "PLSQL",
        }
    }
}

impl Display for Language {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.key())
    }
}
