use crate::{digest::Digest, reference::TagName, types::PackageType, urls::RegistryUrls};

/// What the pull command addresses. Decided by the resolution step that
/// produced it, never by looking at the string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullReference<'a> {
    Tag(&'a TagName),
    Digest(&'a Digest),
    Version(&'a str),
}

impl PullReference<'_> {
    fn value(&self) -> String {
        match self {
            Self::Tag(tag) => tag.to_string(),
            Self::Digest(digest) => digest.to_string(),
            Self::Version(version) => version.to_string(),
        }
    }
}

/// Location of the registry a command pulls from.
#[derive(Clone, Copy, Debug)]
pub struct PullTarget<'a> {
    pub urls: &'a RegistryUrls,
    pub root: &'a str,
    pub registry: &'a str,
}

/// Client command that fetches `image` at `reference`.
pub fn pull_command(
    package_type: PackageType,
    target: PullTarget<'_>,
    image: &str,
    reference: PullReference<'_>,
) -> String {
    let PullTarget {
        urls,
        root,
        registry,
    } = target;
    let pkg = || urls.package_url(root, registry, package_type);
    let version = reference.value();

    match package_type {
        PackageType::Docker => {
            let repo = format!("{}/{}", urls.registry_ref(root, registry), image);
            match reference {
                PullReference::Digest(digest) => format!("docker pull {repo}@{digest}"),
                _ => format!("docker pull {repo}:{version}"),
            }
        }
        PackageType::Helm => {
            let repo = format!("oci://{}/{}", urls.registry_ref(root, registry), image);
            match reference {
                PullReference::Digest(digest) => format!("helm pull {repo}@{digest}"),
                _ => format!("helm pull {repo} --version {version}"),
            }
        }
        PackageType::Generic => {
            format!("curl --location '{}/{image}/{version}/<FILENAME>' -J -O", pkg())
        }
        PackageType::Maven => format!(
            "mvn dependency:get -Dartifact={image}:{version} -DremoteRepositories={}",
            pkg()
        ),
        PackageType::Python => format!(
            "pip install {image}=={version} --index-url {}/simple --no-deps",
            pkg()
        ),
        PackageType::Npm => format!("npm install {image}@{version} --registry {}/", pkg()),
        PackageType::Nuget => format!(
            "nuget install {image} -Version {version} -Source {}/index.json",
            pkg()
        ),
        PackageType::Cargo => format!("cargo add {image}@{version} --registry {registry}"),
        PackageType::Go => format!("GOPROXY={} go get {image}@{version}", pkg()),
        PackageType::Rpm => format!("yum install {image}-{version}"),
        PackageType::HuggingFace => format!(
            "HF_ENDPOINT={} huggingface-cli download {image} --revision {version}",
            pkg()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> RegistryUrls {
        RegistryUrls::parse("https://pkg.example.com").unwrap()
    }

    fn command(package_type: PackageType, image: &str, reference: PullReference<'_>) -> String {
        let urls = urls();
        let target = PullTarget {
            urls: &urls,
            root: "Acme",
            registry: "local",
        };
        pull_command(package_type, target, image, reference)
    }

    #[test]
    fn docker_by_tag_and_digest() {
        let tag = TagName::new("v1").unwrap();
        let digest = Digest::of(b"manifest");

        assert_eq!(
            command(PackageType::Docker, "nginx", PullReference::Tag(&tag)),
            "docker pull pkg.example.com/acme/local/nginx:v1"
        );
        assert_eq!(
            command(PackageType::Docker, "nginx", PullReference::Digest(&digest)),
            format!("docker pull pkg.example.com/acme/local/nginx@{digest}")
        );
    }

    #[test]
    fn hex_looking_tag_still_pulls_by_tag() {
        let tag = TagName::new("a".repeat(64)).unwrap();

        assert_eq!(
            command(PackageType::Docker, "nginx", PullReference::Tag(&tag)),
            format!("docker pull pkg.example.com/acme/local/nginx:{}", "a".repeat(64))
        );
    }

    #[test]
    fn helm_by_tag_and_digest() {
        let tag = TagName::new("1.2.0").unwrap();
        let digest = Digest::of(b"chart");

        assert_eq!(
            command(PackageType::Helm, "podinfo", PullReference::Tag(&tag)),
            "helm pull oci://pkg.example.com/acme/local/podinfo --version 1.2.0"
        );
        assert_eq!(
            command(PackageType::Helm, "podinfo", PullReference::Digest(&digest)),
            format!("helm pull oci://pkg.example.com/acme/local/podinfo@{digest}")
        );
    }

    #[test]
    fn flat_versioned_commands() {
        let v = PullReference::Version("1.0.0");

        assert_eq!(
            command(PackageType::Maven, "com.acme:lib", v),
            "mvn dependency:get -Dartifact=com.acme:lib:1.0.0 -DremoteRepositories=https://pkg.example.com/pkg/acme/local/maven"
        );
        assert_eq!(
            command(PackageType::Python, "requests", v),
            "pip install requests==1.0.0 --index-url https://pkg.example.com/pkg/acme/local/python/simple --no-deps"
        );
        assert_eq!(
            command(PackageType::Npm, "left-pad", v),
            "npm install left-pad@1.0.0 --registry https://pkg.example.com/pkg/acme/local/npm/"
        );
        assert_eq!(
            command(PackageType::Nuget, "Newtonsoft.Json", v),
            "nuget install Newtonsoft.Json -Version 1.0.0 -Source https://pkg.example.com/pkg/acme/local/nuget/index.json"
        );
        assert_eq!(
            command(PackageType::Cargo, "serde", v),
            "cargo add serde@1.0.0 --registry local"
        );
        assert_eq!(
            command(PackageType::Go, "example.com/mod", v),
            "GOPROXY=https://pkg.example.com/pkg/acme/local/go go get example.com/mod@1.0.0"
        );
        assert_eq!(command(PackageType::Rpm, "bash", v), "yum install bash-1.0.0");
        assert_eq!(
            command(PackageType::Generic, "tool", v),
            "curl --location 'https://pkg.example.com/pkg/acme/local/generic/tool/1.0.0/<FILENAME>' -J -O"
        );
        assert_eq!(
            command(PackageType::HuggingFace, "bert", v),
            "HF_ENDPOINT=https://pkg.example.com/pkg/acme/local/huggingface huggingface-cli download bert --revision 1.0.0"
        );
    }
}
