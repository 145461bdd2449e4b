//! Fixture builders
//!
//! [`ManifestBuilder`] renders manifest source text; [`AddonTree`] writes
//! addon directories into temporary search paths.

#![allow(dead_code)]

use addonctl_core::types::ManifestFile;
use addonctl_modules::{AddonRegistry, DependencyGraph};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for manifest source text
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    name: String,
    version: Option<String>,
    depends: Vec<String>,
    auto_install: Option<String>,
    installable: Option<bool>,
    data: Vec<String>,
    demo: Vec<String>,
    hooks: Vec<(String, String)>,
    raw: Vec<(String, String)>,
}

fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{}'", i)).collect();
    format!("[{}]", quoted.join(", "))
}

impl ManifestBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            depends: Vec::new(),
            auto_install: None,
            installable: None,
            data: Vec::new(),
            demo: Vec::new(),
            hooks: Vec::new(),
            raw: Vec::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn depends(mut self, deps: &[&str]) -> Self {
        self.depends = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Boolean auto-install
    pub fn auto_install(mut self) -> Self {
        self.auto_install = Some("True".to_string());
        self
    }

    /// Set-form auto-install
    pub fn auto_install_when(mut self, trigger: &[&str]) -> Self {
        let trigger: Vec<String> = trigger.iter().map(|t| t.to_string()).collect();
        self.auto_install = Some(quoted_list(&trigger));
        self
    }

    pub fn not_installable(mut self) -> Self {
        self.installable = Some(false);
        self
    }

    pub fn data(mut self, files: &[&str]) -> Self {
        self.data = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn demo(mut self, files: &[&str]) -> Self {
        self.demo = files.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Declare a hook, e.g. `hook("post_init_hook", "_post_init")`
    pub fn hook(mut self, key: &str, entrypoint: &str) -> Self {
        self.hooks.push((key.to_string(), entrypoint.to_string()));
        self
    }

    /// Add a key with literal source text as its value
    pub fn raw(mut self, key: &str, literal: &str) -> Self {
        self.raw.push((key.to_string(), literal.to_string()));
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# -*- coding: utf-8 -*-\n{\n");
        out.push_str(&format!("    'name': '{}',\n", self.name));
        if let Some(version) = &self.version {
            out.push_str(&format!("    'version': '{}',\n", version));
        }
        if !self.depends.is_empty() {
            out.push_str(&format!("    'depends': {},\n", quoted_list(&self.depends)));
        }
        if let Some(auto) = &self.auto_install {
            out.push_str(&format!("    'auto_install': {},\n", auto));
        }
        if let Some(installable) = self.installable {
            let value = if installable { "True" } else { "False" };
            out.push_str(&format!("    'installable': {},\n", value));
        }
        if !self.data.is_empty() {
            out.push_str(&format!("    'data': {},\n", quoted_list(&self.data)));
        }
        if !self.demo.is_empty() {
            out.push_str(&format!("    'demo': {},\n", quoted_list(&self.demo)));
        }
        for (key, entrypoint) in &self.hooks {
            out.push_str(&format!("    '{}': '{}',\n", key, entrypoint));
        }
        for (key, literal) in &self.raw {
            out.push_str(&format!("    '{}': {},\n", key, literal));
        }
        out.push_str("}\n");
        out
    }
}

/// Addon directories laid out in temporary search paths
pub struct AddonTree {
    roots: Vec<TempDir>,
}

impl AddonTree {
    /// One empty search path
    pub fn new() -> Self {
        Self::with_paths(1)
    }

    /// `count` empty search paths, in priority order
    pub fn with_paths(count: usize) -> Self {
        Self {
            roots: (0..count).map(|_| TempDir::new().unwrap()).collect(),
        }
    }

    pub fn path(&self, index: usize) -> &Path {
        self.roots[index].path()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|r| r.path().to_path_buf()).collect()
    }

    /// Write `manifest` as `__manifest__.py` of `dir` in the first search path
    pub fn add(self, dir: &str, manifest: ManifestBuilder) -> Self {
        self.add_in(0, dir, ManifestFile::Manifest, &manifest.render())
    }

    /// Write a plain addon with the given dependencies
    pub fn addon(self, name: &str, depends: &[&str]) -> Self {
        self.add(name, ManifestBuilder::new(name).depends(depends))
    }

    /// Write raw manifest source under a specific file name and search path
    pub fn add_in(self, root: usize, dir: &str, file: ManifestFile, source: &str) -> Self {
        let addon_dir = self.roots[root].path().join(dir);
        fs::create_dir_all(&addon_dir).unwrap();
        fs::write(addon_dir.join(file.file_name()), source).unwrap();
        self
    }

    /// Create an addon directory with no manifest
    pub fn empty_dir(self, root: usize, dir: &str) -> Self {
        fs::create_dir_all(self.roots[root].path().join(dir)).unwrap();
        self
    }

    /// Create a resource file inside an addon directory
    pub fn resource(self, dir: &str, relative: &str) -> Self {
        let path = self.roots[0].path().join(dir).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<odoo/>").unwrap();
        self
    }

    pub fn discover(&self) -> AddonRegistry {
        AddonRegistry::discover(&self.paths()).0
    }

    pub fn graph(&self) -> (AddonRegistry, DependencyGraph) {
        let registry = self.discover();
        let graph = DependencyGraph::build(&registry).unwrap();
        (registry, graph)
    }
}

impl Default for AddonTree {
    fn default() -> Self {
        Self::new()
    }
}

/// The `sale` family used across scenarios
pub fn sales_tree() -> AddonTree {
    AddonTree::new()
        .addon("base", &[])
        .addon("sale", &[])
        .addon("crm", &[])
        .addon("sms", &[])
        .addon("sale_crm", &["sale", "crm"])
        .add(
            "sale_crm_sms",
            ManifestBuilder::new("sale_crm_sms")
                .depends(&["sale", "sms"])
                .auto_install(),
        )
}
