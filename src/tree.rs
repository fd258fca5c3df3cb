//! Folder view of an archive and file classification helpers.

use std::cmp::Ordering;

use crate::path::CanonicalPath;
use crate::store::ArchiveStore;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico"];
const EDITABLE_EXTENSIONS: &[&str] = &["json", "jsonc", "json5", "txt", "md"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "m4b", "aac", "ogg", "opus", "flac", "wav"];
const JSON_EXTENSIONS: &[&str] = &["json", "jsonc", "json5"];

/// Coarse classification of an entry by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Image,
    Text,
    Binary,
}

impl FileType {
    pub fn of(path: &str) -> Self {
        if is_image(path) {
            FileType::Image
        } else if is_editable(path) {
            FileType::Text
        } else {
            FileType::Binary
        }
    }
}

fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn has_extension(path: &str, set: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| set.contains(&ext.as_str()))
}

pub fn is_image(path: &str) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

/// Text formats that can be edited in place.
pub fn is_editable(path: &str) -> bool {
    has_extension(path, EDITABLE_EXTENSIONS)
}

pub fn is_audio(path: &str) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

/// JSON-family files, which must parse before they can be committed.
pub fn is_json(path: &str) -> bool {
    has_extension(path, JSON_EXTENSIONS)
}

/// Editor language for a path, `plaintext` when unknown.
pub fn language_for(path: &str) -> &'static str {
    match extension_of(path).as_deref() {
        Some("json" | "jsonc" | "json5") => "json",
        Some("js" | "jsx") => "javascript",
        Some("ts" | "tsx") => "typescript",
        Some("md") => "markdown",
        Some("html") => "html",
        Some("css") => "css",
        Some("xml") => "xml",
        Some("yaml" | "yml") => "yaml",
        _ => "plaintext",
    }
}

/// Format a byte size into a human-readable string.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Folder,
    File,
}

/// A folder or file in the tree. The root folder has the empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub path: CanonicalPath,
    pub node_type: NodeType,
    pub children: Vec<FileNode>,
    /// Uncompressed size, files only.
    pub size: Option<u64>,
    /// Lowercased extension, files only.
    pub extension: Option<String>,
    /// Whether the file can be previewed (image or editable text).
    pub is_editable: bool,
}

impl FileNode {
    fn folder(name: &str, path: CanonicalPath) -> Self {
        Self {
            name: name.to_string(),
            path,
            node_type: NodeType::Folder,
            children: Vec::new(),
            size: None,
            extension: None,
            is_editable: false,
        }
    }

    fn file(path: CanonicalPath, size: u64) -> Self {
        let extension = extension_of(path.as_str());
        let is_editable = is_image(path.as_str()) || is_editable(path.as_str());
        Self {
            name: path.file_name().to_string(),
            path,
            node_type: NodeType::File,
            children: Vec::new(),
            size: Some(size),
            extension,
            is_editable,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.node_type == NodeType::Folder
    }

    /// Depth-first search by path; `""` finds the root.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        if self.path.as_str() == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// All file paths below this node, in tree order.
    pub fn file_paths(&self) -> Vec<&CanonicalPath> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a CanonicalPath>) {
        if !self.is_folder() {
            out.push(&self.path);
        }
        for child in &self.children {
            child.collect_files(out);
        }
    }

    fn sort(&mut self) {
        self.children.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });
        for child in &mut self.children {
            child.sort();
        }
    }
}

pub struct FileTree;

impl FileTree {
    /// Builds the folder tree of every entry in the store. Folders come
    /// before files at each level, each group sorted by name.
    pub fn build(store: &ArchiveStore) -> FileNode {
        let mut root = FileNode::folder("root", CanonicalPath::root());

        for path in store.list() {
            let size = store.get(&path).map(|data| data.len() as u64).unwrap_or(0);
            let segments: Vec<&str> = path.segments().collect();
            let Some((_, dirs)) = segments.split_last() else {
                continue;
            };

            let mut node = &mut root;
            for (depth, dir) in dirs.iter().enumerate() {
                let index = match node
                    .children
                    .iter()
                    .position(|c| c.is_folder() && c.name == *dir)
                {
                    Some(index) => index,
                    None => {
                        let dir_path = CanonicalPath::normalize(&dirs[..=depth].join("/"))
                            .unwrap_or_default();
                        node.children.push(FileNode::folder(dir, dir_path));
                        node.children.len() - 1
                    }
                };
                node = &mut node.children[index];
            }
            node.children.push(FileNode::file(path.clone(), size));
        }

        root.sort();
        root
    }
}

/// True when `path` lies strictly inside `parent`; everything is inside the
/// root.
pub fn is_descendant_of(path: &CanonicalPath, parent: &CanonicalPath) -> bool {
    path != parent && path.starts_with(parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> CanonicalPath {
        CanonicalPath::normalize(raw).unwrap()
    }

    #[test]
    fn test_file_types() {
        assert_eq!(FileType::of("pages/001.JPG"), FileType::Image);
        assert_eq!(FileType::of("notes.md"), FileType::Text);
        assert_eq!(FileType::of("tome.json"), FileType::Text);
        assert_eq!(FileType::of("audio/01.mp3"), FileType::Binary);
        assert_eq!(FileType::of("README"), FileType::Binary);
        assert!(is_audio("audio/01.mp3"));
        assert!(!is_image("archive.jpg/README"));
    }

    #[test]
    fn test_language_for() {
        assert_eq!(language_for("tome.json"), "json");
        assert_eq!(language_for("config.json5"), "json");
        assert_eq!(language_for("chapter.md"), "markdown");
        assert_eq!(language_for("styles.CSS"), "css");
        assert_eq!(language_for("page.png"), "plaintext");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_is_descendant_of() {
        assert!(is_descendant_of(&path("a/b.json"), &path("a")));
        assert!(is_descendant_of(&path("a/b.json"), &CanonicalPath::root()));
        assert!(!is_descendant_of(&path("ab/c"), &path("a")));
        assert!(!is_descendant_of(&path("a"), &path("a")));
    }

    #[test]
    fn test_build_orders_folders_first() {
        let mut store = ArchiveStore::new();
        store.put("tome.json", b"{\"type\":\"comic_chapter\"}".to_vec()).unwrap();
        store.put("pages/b.jpg", b"b".to_vec()).unwrap();
        store.put("pages/a.jpg", b"a".to_vec()).unwrap();
        store.put("about.md", b"hello".to_vec()).unwrap();
        store.put("extras/art/cover.png", b"c".to_vec()).unwrap();

        let root = FileTree::build(&store);
        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["extras", "pages", "about.md", "tome.json"]);

        let paths: Vec<_> = root.file_paths().iter().map(|p| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "extras/art/cover.png",
                "pages/a.jpg",
                "pages/b.jpg",
                "about.md",
                "tome.json"
            ]
        );

        let art = root.find("extras/art").unwrap();
        assert!(art.is_folder());
        let about = root.find("about.md").unwrap();
        assert_eq!(about.size, Some(5));
        assert_eq!(about.extension.as_deref(), Some("md"));
        assert!(about.is_editable);
        assert!(root.find("missing").is_none());
        assert!(root.find("").is_some());
    }
}
