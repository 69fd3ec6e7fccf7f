// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package descriptor generation.
//!
//! [`DebianGenerator`] writes `DEBIAN/control`, `DEBIAN/postinst` and
//! `DEBIAN/prerm` into the staged package tree. A `<file>.template` in the
//! template directory replaces the built-in layout of that file;
//! `{{ variable }}` placeholders are substituted from [`DescriptorVars`].

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use plugind_config::PlugindConfig;
use plugind_core::PlugindError;
use plugind_plugin::PluginMetadata;

const DEBIAN_DIR: &str = "DEBIAN";
const DEFAULT_MAINTAINER: &str = "Wazo Plugind <dev@wazo.community>";

/// Values available to descriptor templates.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorVars {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub package_name: String,
    pub section: String,
    pub maintainer: String,
    pub description: String,
    pub depends: Vec<String>,
    /// Installed location of the plugin's rules script.
    pub rules_path: PathBuf,
}

impl DescriptorVars {
    pub fn new(config: &PlugindConfig, metadata: &PluginMetadata) -> Self {
        let rules_path = config
            .paths
            .metadata_dir
            .join(&metadata.namespace)
            .join(&metadata.name)
            .join(&config.build.install_filename);
        Self {
            namespace: metadata.namespace.clone(),
            name: metadata.name.clone(),
            version: metadata.version.clone(),
            package_name: config.build.package_name(&metadata.namespace, &metadata.name),
            section: config.build.package_section.clone(),
            maintainer: metadata
                .author
                .clone()
                .unwrap_or_else(|| DEFAULT_MAINTAINER.to_string()),
            description: metadata
                .description
                .clone()
                .or_else(|| metadata.display_name.clone())
                .unwrap_or_else(|| format!("{}/{} plugin", metadata.namespace, metadata.name)),
            depends: metadata.debian_depends.clone(),
            rules_path,
        }
    }

    fn as_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("namespace", self.namespace.clone()),
            ("name", self.name.clone()),
            ("version", self.version.clone()),
            ("package_name", self.package_name.clone()),
            ("debian_package_section", self.section.clone()),
            ("maintainer", self.maintainer.clone()),
            ("description", self.description.clone()),
            ("depends", self.depends.join(", ")),
            ("rules_path", self.rules_path.display().to_string()),
        ])
    }
}

/// Materializes the package-manager control files for a staged package.
pub trait DescriptorGenerator: Send + Sync + 'static {
    fn generate(&self, vars: &DescriptorVars, pkgdir: &Path) -> Result<(), PlugindError>;
}

#[derive(Debug, Clone)]
pub struct DebianGenerator {
    template_dir: PathBuf,
}

impl DebianGenerator {
    pub fn new(config: &PlugindConfig) -> Self {
        Self {
            template_dir: config.paths.template_dir.clone(),
        }
    }

    fn render(&self, file: &str, vars: &DescriptorVars) -> Result<String, PlugindError> {
        let template_path = self.template_dir.join(format!("{file}.template"));
        match std::fs::read_to_string(&template_path) {
            Ok(template) => Ok(substitute(&template, &vars.as_map())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(default_content(file, vars)),
            Err(e) => Err(PlugindError::io(
                format!("failed to read template {}", template_path.display()),
                e,
            )),
        }
    }
}

impl DescriptorGenerator for DebianGenerator {
    fn generate(&self, vars: &DescriptorVars, pkgdir: &Path) -> Result<(), PlugindError> {
        let debian_dir = pkgdir.join(DEBIAN_DIR);
        std::fs::create_dir_all(&debian_dir)
            .map_err(|e| PlugindError::io(format!("failed to create {}", debian_dir.display()), e))?;

        for (file, mode) in [("control", None), ("postinst", Some(0o755)), ("prerm", Some(0o755))] {
            let path = debian_dir.join(file);
            std::fs::write(&path, self.render(file, vars)?)
                .map_err(|e| PlugindError::io(format!("failed to write {}", path.display()), e))?;
            if let Some(mode) = mode {
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
                    .map_err(|e| PlugindError::io(format!("failed to chmod {}", path.display()), e))?;
            }
        }
        Ok(())
    }
}

fn default_content(file: &str, vars: &DescriptorVars) -> String {
    match file {
        "control" => {
            let mut control = format!(
                "Package: {}\nVersion: {}\nSection: {}\nArchitecture: all\nMaintainer: {}\n",
                vars.package_name, vars.version, vars.section, vars.maintainer
            );
            if !vars.depends.is_empty() {
                control.push_str(&format!("Depends: {}\n", vars.depends.join(", ")));
            }
            control.push_str(&format!("Description: {}\n", vars.description));
            control
        }
        "postinst" => format!(
            "#!/bin/sh\nset -e\n\ncase \"$1\" in\n    configure)\n        {} postinst\n    ;;\nesac\n",
            vars.rules_path.display()
        ),
        "prerm" => format!(
            "#!/bin/sh\nset -e\n\ncase \"$1\" in\n    remove)\n        {} uninstall\n    ;;\nesac\n",
            vars.rules_path.display()
        ),
        _ => String::new(),
    }
}

/// Replaces `{{ key }}` (whitespace inside the braces optional) with values.
/// Unknown placeholders are left untouched.
fn substitute(template: &str, values: &BTreeMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match values.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugind_plugin::RawMetadata;

    fn vars(debian_depends: &str) -> DescriptorVars {
        let metadata = RawMetadata::parse(&format!(
            "namespace = \"official\"\nname = \"admin-ui\"\nversion = \"1.2\"\ndebian_depends = [{debian_depends}]\n"
        ))
        .unwrap()
        .validate("17.10")
        .unwrap();
        DescriptorVars::new(&PlugindConfig::default(), &metadata)
    }

    #[test]
    fn default_files_are_written_with_modes() {
        let dir = tempfile::tempdir().unwrap();
        let generator = DebianGenerator {
            template_dir: dir.path().join("no-templates"),
        };
        generator.generate(&vars("\"curl\", \"jq\""), dir.path()).unwrap();

        let control = std::fs::read_to_string(dir.path().join("DEBIAN/control")).unwrap();
        assert!(control.contains("Package: wazo-plugind-admin-ui-official\n"));
        assert!(control.contains("Section: wazo-plugind-plugin\n"));
        assert!(control.contains("Depends: curl, jq\n"));

        let postinst = dir.path().join("DEBIAN/postinst");
        let content = std::fs::read_to_string(&postinst).unwrap();
        assert!(content.contains("/usr/lib/wazo-plugind/plugins/official/admin-ui/wazo/rules postinst"));
        let mode = std::fs::metadata(&postinst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn control_omits_empty_depends() {
        let control = default_content("control", &vars(""));
        assert!(!control.contains("Depends:"));
    }

    #[test]
    fn templates_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("control.template"),
            "Package: {{ package_name }}\nX-Plugin: {{namespace}}/{{ name }} {{ unknown }}\n",
        )
        .unwrap();
        let generator = DebianGenerator {
            template_dir: dir.path().to_path_buf(),
        };
        let pkgdir = dir.path().join("pkg");
        generator.generate(&vars(""), &pkgdir).unwrap();

        let control = std::fs::read_to_string(pkgdir.join("DEBIAN/control")).unwrap();
        assert_eq!(
            control,
            "Package: wazo-plugind-admin-ui-official\nX-Plugin: official/admin-ui {{ unknown }}\n"
        );
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let values = BTreeMap::from([("name", "x".to_string())]);
        assert_eq!(substitute("a {{ name }} b {{ name", &values), "a x b {{ name");
    }
}
