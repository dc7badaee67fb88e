use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The ecosystem a registry serves.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum PackageType {
    Docker,
    Helm,
    Generic,
    Maven,
    Python,
    Npm,
    Nuget,
    Cargo,
    Go,
    Rpm,
    #[serde(rename = "HUGGINGFACE")]
    #[strum(serialize = "HUGGINGFACE")]
    HuggingFace,
}

impl PackageType {
    /// Tag/digest addressed ecosystems.
    pub fn is_oci(self) -> bool {
        matches!(self, Self::Docker | Self::Helm)
    }

    pub fn path_segment(self) -> String {
        self.as_ref().to_ascii_lowercase()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegistryKind {
    Virtual,
    Upstream,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub id: i64,
    pub parent_id: i64,
    pub root_identifier: String,
    pub name: String,
    pub package_type: PackageType,
    pub kind: RegistryKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_type_strings() {
        assert_eq!(PackageType::Docker.to_string(), "DOCKER");
        assert_eq!(PackageType::HuggingFace.to_string(), "HUGGINGFACE");
        assert_eq!("helm".parse::<PackageType>().unwrap(), PackageType::Helm);
        assert_eq!(
            "HuggingFace".parse::<PackageType>().unwrap(),
            PackageType::HuggingFace
        );
        assert!("cobol".parse::<PackageType>().is_err());
        assert_eq!(PackageType::Nuget.path_segment(), "nuget");
    }

    #[test]
    fn families() {
        assert!(PackageType::Docker.is_oci());
        assert!(PackageType::Helm.is_oci());
        assert!(!PackageType::Maven.is_oci());
        assert!(!PackageType::HuggingFace.is_oci());
    }

    #[test]
    fn package_type_json() {
        let value: PackageType = serde_json::from_str(r#""HUGGINGFACE""#).unwrap();
        assert_eq!(value, PackageType::HuggingFace);
        assert_eq!(serde_json::to_string(&PackageType::Npm).unwrap(), r#""NPM""#);
    }
}
