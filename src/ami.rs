//! EKS optimized AMI families and instance type classification.
//!
//! Maps operating system, GPU support and CPU architecture onto the AMI types
//! accepted by managed node groups. See
//! <https://docs.aws.amazon.com/eks/latest/userguide/eks-optimized-amis.html>.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Instance type used when a node group names none.
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.medium";

/// CPU architecture of an instance type or AMI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuArchitecture {
    /// 64-bit x86 (Intel / AMD).
    #[serde(rename = "x86_64")]
    X86_64,
    /// 64-bit ARM (Graviton).
    #[serde(rename = "arm64")]
    Arm64,
}

impl fmt::Display for CpuArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => f.write_str("x86_64"),
            Self::Arm64 => f.write_str("arm64"),
        }
    }
}

/// The EKS optimized operating system family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingSystem {
    /// Amazon Linux 2.
    #[serde(rename = "AL2")]
    Al2,
    /// Amazon Linux 2023.
    #[default]
    #[serde(rename = "AL2023")]
    Al2023,
    /// Bottlerocket.
    #[serde(rename = "Bottlerocket")]
    Bottlerocket,
}

impl OperatingSystem {
    /// The operating system AWS currently recommends for EKS nodes.
    pub const RECOMMENDED: OperatingSystem = OperatingSystem::Al2023;

    /// The wire name of the operating system.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Al2 => "AL2",
            Self::Al2023 => "AL2023",
            Self::Bottlerocket => "Bottlerocket",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AMI types accepted by `CreateNodegroup`.
///
/// Windows AMIs are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AmiType {
    /// `AL2_x86_64`
    Al2X86_64,
    /// `AL2_x86_64_GPU`
    Al2X86_64Gpu,
    /// `AL2_ARM_64`
    Al2Arm64,
    /// `AL2023_x86_64_STANDARD`
    Al2023X86_64Standard,
    /// `AL2023_ARM_64_STANDARD`
    Al2023Arm64Standard,
    /// `AL2023_x86_64_NVIDIA`
    Al2023X86_64Nvidia,
    /// `BOTTLEROCKET_ARM_64`
    BottlerocketArm64,
    /// `BOTTLEROCKET_x86_64`
    BottlerocketX86_64,
    /// `BOTTLEROCKET_ARM_64_NVIDIA`
    BottlerocketArm64Nvidia,
    /// `BOTTLEROCKET_x86_64_NVIDIA`
    BottlerocketX86_64Nvidia,
}

impl AmiType {
    /// Every supported AMI type, in selection order.
    pub const ALL: [AmiType; 10] = [
        AmiType::Al2X86_64,
        AmiType::Al2X86_64Gpu,
        AmiType::Al2Arm64,
        AmiType::Al2023X86_64Standard,
        AmiType::Al2023Arm64Standard,
        AmiType::Al2023X86_64Nvidia,
        AmiType::BottlerocketArm64,
        AmiType::BottlerocketX86_64,
        AmiType::BottlerocketArm64Nvidia,
        AmiType::BottlerocketX86_64Nvidia,
    ];

    /// The EKS API name of the AMI type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Al2X86_64 => "AL2_x86_64",
            Self::Al2X86_64Gpu => "AL2_x86_64_GPU",
            Self::Al2Arm64 => "AL2_ARM_64",
            Self::Al2023X86_64Standard => "AL2023_x86_64_STANDARD",
            Self::Al2023Arm64Standard => "AL2023_ARM_64_STANDARD",
            Self::Al2023X86_64Nvidia => "AL2023_x86_64_NVIDIA",
            Self::BottlerocketArm64 => "BOTTLEROCKET_ARM_64",
            Self::BottlerocketX86_64 => "BOTTLEROCKET_x86_64",
            Self::BottlerocketArm64Nvidia => "BOTTLEROCKET_ARM_64_NVIDIA",
            Self::BottlerocketX86_64Nvidia => "BOTTLEROCKET_x86_64_NVIDIA",
        }
    }

    /// The operating system family of the AMI.
    pub fn operating_system(&self) -> OperatingSystem {
        match self {
            Self::Al2X86_64 | Self::Al2X86_64Gpu | Self::Al2Arm64 => OperatingSystem::Al2,
            Self::Al2023X86_64Standard | Self::Al2023Arm64Standard | Self::Al2023X86_64Nvidia => {
                OperatingSystem::Al2023
            },
            Self::BottlerocketArm64
            | Self::BottlerocketX86_64
            | Self::BottlerocketArm64Nvidia
            | Self::BottlerocketX86_64Nvidia => OperatingSystem::Bottlerocket,
        }
    }

    /// The CPU architecture the AMI is built for.
    pub fn architecture(&self) -> CpuArchitecture {
        match self {
            Self::Al2Arm64
            | Self::Al2023Arm64Standard
            | Self::BottlerocketArm64
            | Self::BottlerocketArm64Nvidia => CpuArchitecture::Arm64,
            _ => CpuArchitecture::X86_64,
        }
    }

    /// Whether the AMI ships GPU drivers.
    pub fn gpu_support(&self) -> bool {
        matches!(
            self,
            Self::Al2X86_64Gpu
                | Self::Al2023X86_64Nvidia
                | Self::BottlerocketArm64Nvidia
                | Self::BottlerocketX86_64Nvidia
        )
    }

    /// Find the AMI type matching an operating system, GPU requirement and architecture.
    ///
    /// Returns `None` for combinations EKS does not publish (e.g. AL2023 with
    /// NVIDIA drivers on arm64).
    pub fn find(os: OperatingSystem, gpu: bool, architecture: CpuArchitecture) -> Option<Self> {
        Self::ALL.into_iter().find(|ami| {
            ami.operating_system() == os
                && ami.gpu_support() == gpu
                && ami.architecture() == architecture
        })
    }

    /// Select the AMI type for a node group's instance types.
    ///
    /// An explicit `gpu` requirement is honoured as is. Without one, GPU
    /// instances prefer an NVIDIA image and fall back to the standard image
    /// when none is published for the combination (e.g. AL2023 on `g5g`).
    pub fn select(
        os: OperatingSystem,
        gpu: Option<bool>,
        architecture: CpuArchitecture,
        instance_types: &[String],
    ) -> Option<Self> {
        match gpu {
            Some(gpu) => Self::find(os, gpu, architecture),
            None if all_gpu(instance_types) => Self::find(os, true, architecture)
                .or_else(|| Self::find(os, false, architecture)),
            None => Self::find(os, false, architecture),
        }
    }

    fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "amazon-linux-2" => Some(Self::Al2X86_64),
            "amazon-linux-2-gpu" => Some(Self::Al2X86_64Gpu),
            "amazon-linux-2-arm" => Some(Self::Al2Arm64),
            "amazon-linux-2023/x86_64/standard" => Some(Self::Al2023X86_64Standard),
            "amazon-linux-2023/arm64/standard" => Some(Self::Al2023Arm64Standard),
            "amazon-linux-2023/x86_64/nvidia" => Some(Self::Al2023X86_64Nvidia),
            _ => None,
        }
    }
}

impl fmt::Display for AmiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmiType {
    type Err = String;

    /// Accepts EKS API names as well as the legacy SSM-path aliases
    /// (`amazon-linux-2`, `amazon-linux-2-gpu`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ami| ami.as_str() == s)
            .or_else(|| Self::from_alias(s))
            .ok_or_else(|| format!("unknown AMI type '{}'", s))
    }
}

impl TryFrom<String> for AmiType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AmiType> for String {
    fn from(ami: AmiType) -> Self {
        ami.as_str().to_string()
    }
}

/// The parsed components of an EC2 instance type such as `c6gn.xlarge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceType<'a> {
    /// Instance family letters (`c`).
    pub family: &'a str,
    /// Generation digits (`6`).
    pub generation: &'a str,
    /// Processor letter, if any (`g`).
    pub processor: Option<char>,
    /// Size after the dot (`xlarge`).
    pub size: &'a str,
}

impl<'a> InstanceType<'a> {
    /// Parse an instance type of the form `<family><generation>[processor][capabilities][-suffix].<size>`.
    ///
    /// `<family>-<generation><memory>.<size>` (e.g. `u-6tb1.metal`) is also accepted.
    pub fn parse(instance_type: &'a str) -> Option<Self> {
        let (class, size) = instance_type.split_once('.')?;
        if size.is_empty()
            || !size
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return None;
        }

        let family_end = class
            .find(|c: char| !c.is_ascii_lowercase())
            .unwrap_or(class.len());
        let family = &class[..family_end];
        // High-memory classes such as `u-6tb1` separate the family with a hyphen.
        let (hyphenated, rest) = match class[family_end..].strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, &class[family_end..]),
        };
        let generation_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let generation = &rest[..generation_end];
        if family.is_empty() || generation.is_empty() {
            return None;
        }

        let processor = if hyphenated {
            None
        } else {
            rest[generation_end..]
                .chars()
                .next()
                .filter(|c| c.is_ascii_lowercase())
        };

        Some(Self {
            family,
            generation,
            processor,
            size,
        })
    }

    /// Graviton instances carry the processor letter `g`.
    pub fn architecture(&self) -> CpuArchitecture {
        if self.processor == Some('g') {
            CpuArchitecture::Arm64
        } else {
            CpuArchitecture::X86_64
        }
    }

    /// Accelerated computing families with NVIDIA GPUs (`p*`, `g*`).
    pub fn is_gpu(&self) -> bool {
        matches!(self.family, "p" | "g" | "gr")
    }
}

/// Why the architecture of a set of instance types could not be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchitectureError {
    /// An instance type does not follow the EC2 naming scheme.
    InvalidInstanceType(String),
    /// The instance types mix arm64 and x86_64.
    Mixed,
}

/// Determine the common architecture of a set of instance types.
///
/// Defaults to x86_64 when the list is empty.
pub fn architecture_of(instance_types: &[String]) -> Result<CpuArchitecture, ArchitectureError> {
    let mut found = None;
    for instance_type in instance_types {
        let parsed = InstanceType::parse(instance_type)
            .ok_or_else(|| ArchitectureError::InvalidInstanceType(instance_type.clone()))?;
        match found {
            None => found = Some(parsed.architecture()),
            Some(arch) if arch != parsed.architecture() => return Err(ArchitectureError::Mixed),
            Some(_) => {},
        }
    }
    Ok(found.unwrap_or(CpuArchitecture::X86_64))
}

/// Whether every instance type belongs to a GPU family.
///
/// Unparsable instance types count as non-GPU; the validator reports them.
pub fn all_gpu(instance_types: &[String]) -> bool {
    !instance_types.is_empty()
        && instance_types.iter().all(|it| {
            InstanceType::parse(it)
                .map(|parsed| parsed.is_gpu())
                .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_instance_type() {
        let parsed = InstanceType::parse("c6gn.xlarge").unwrap();
        assert_eq!(parsed.family, "c");
        assert_eq!(parsed.generation, "6");
        assert_eq!(parsed.processor, Some('g'));
        assert_eq!(parsed.size, "xlarge");

        let parsed = InstanceType::parse("m7i-flex.large").unwrap();
        assert_eq!(parsed.processor, Some('i'));
        assert_eq!(parsed.architecture(), CpuArchitecture::X86_64);

        let parsed = InstanceType::parse("t3.medium").unwrap();
        assert_eq!(parsed.processor, None);

        let parsed = InstanceType::parse("u-6tb1.metal").unwrap();
        assert_eq!(parsed.family, "u");
        assert_eq!(parsed.generation, "6");
        assert_eq!(parsed.processor, None);
        assert_eq!(parsed.architecture(), CpuArchitecture::X86_64);

        assert!(InstanceType::parse("medium").is_none());
        assert!(InstanceType::parse("u-tb1.metal").is_none());
        assert!(InstanceType::parse("t3.").is_none());
        assert!(InstanceType::parse("3t.large").is_none());
    }

    #[test]
    fn test_graviton_detection() {
        assert_eq!(
            InstanceType::parse("t4g.medium").unwrap().architecture(),
            CpuArchitecture::Arm64
        );
        assert_eq!(
            InstanceType::parse("m5.large").unwrap().architecture(),
            CpuArchitecture::X86_64
        );
        assert_eq!(
            InstanceType::parse("p4d.24xlarge").unwrap().architecture(),
            CpuArchitecture::X86_64
        );
    }

    #[test]
    fn test_gpu_detection() {
        assert!(InstanceType::parse("g5.xlarge").unwrap().is_gpu());
        assert!(InstanceType::parse("p5.48xlarge").unwrap().is_gpu());
        assert!(!InstanceType::parse("t4g.medium").unwrap().is_gpu());

        assert!(all_gpu(&types(&["g5.xlarge", "g6.xlarge"])));
        assert!(!all_gpu(&types(&["g5.xlarge", "m5.large"])));
        assert!(!all_gpu(&[]));
    }

    #[test]
    fn test_architecture_of() {
        assert_eq!(architecture_of(&[]), Ok(CpuArchitecture::X86_64));
        assert_eq!(
            architecture_of(&types(&["t4g.medium", "c7g.large"])),
            Ok(CpuArchitecture::Arm64)
        );
        assert_eq!(
            architecture_of(&types(&["t4g.medium", "t3.medium"])),
            Err(ArchitectureError::Mixed)
        );
        assert_eq!(
            architecture_of(&types(&["u-6tb1.metal", "m5.large"])),
            Ok(CpuArchitecture::X86_64)
        );
        assert_eq!(
            architecture_of(&types(&["bogus"])),
            Err(ArchitectureError::InvalidInstanceType("bogus".to_string()))
        );
    }

    #[test]
    fn test_find_ami_type() {
        assert_eq!(
            AmiType::find(OperatingSystem::Al2023, false, CpuArchitecture::X86_64),
            Some(AmiType::Al2023X86_64Standard)
        );
        assert_eq!(
            AmiType::find(OperatingSystem::Al2023, false, CpuArchitecture::Arm64),
            Some(AmiType::Al2023Arm64Standard)
        );
        assert_eq!(
            AmiType::find(OperatingSystem::Bottlerocket, true, CpuArchitecture::Arm64),
            Some(AmiType::BottlerocketArm64Nvidia)
        );
        assert_eq!(
            AmiType::find(OperatingSystem::Al2023, true, CpuArchitecture::Arm64),
            None
        );
    }

    #[test]
    fn test_ami_type_names_and_aliases() {
        for ami in AmiType::ALL {
            assert_eq!(ami.as_str().parse::<AmiType>(), Ok(ami));
        }
        assert_eq!("amazon-linux-2-arm".parse::<AmiType>(), Ok(AmiType::Al2Arm64));
        assert!("WINDOWS_CORE_2019_x86_64".parse::<AmiType>().is_err());
    }

    #[test]
    fn test_ami_type_serde() {
        let json = serde_json::to_value(AmiType::BottlerocketX86_64).unwrap();
        assert_eq!(json, serde_json::json!("BOTTLEROCKET_x86_64"));

        let parsed: AmiType = serde_json::from_value(serde_json::json!("AL2_ARM_64")).unwrap();
        assert_eq!(parsed, AmiType::Al2Arm64);

        let os: OperatingSystem = serde_json::from_value(serde_json::json!("Bottlerocket")).unwrap();
        assert_eq!(os, OperatingSystem::Bottlerocket);
    }

    #[test]
    fn test_select_falls_back_to_standard_image() {
        let graviton_gpu = vec!["g5g.xlarge".to_string()];
        assert_eq!(
            AmiType::select(OperatingSystem::Al2023, None, CpuArchitecture::Arm64, &graviton_gpu),
            Some(AmiType::Al2023Arm64Standard)
        );
        assert_eq!(
            AmiType::select(
                OperatingSystem::Bottlerocket,
                None,
                CpuArchitecture::Arm64,
                &graviton_gpu
            ),
            Some(AmiType::BottlerocketArm64Nvidia)
        );
        // An explicit requirement never falls back.
        assert_eq!(
            AmiType::select(
                OperatingSystem::Al2023,
                Some(true),
                CpuArchitecture::Arm64,
                &graviton_gpu
            ),
            None
        );

        let x86_gpu = vec!["g5.xlarge".to_string()];
        assert_eq!(
            AmiType::select(OperatingSystem::Al2023, None, CpuArchitecture::X86_64, &x86_gpu),
            Some(AmiType::Al2023X86_64Nvidia)
        );
    }
}
