use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::read_dataset;
use crate::types::{Dataset, ImageRecord, RecordId};
use crate::utils::ensure_directory;

#[derive(Debug, Clone)]
pub struct PreviewOptions {
    /// `None` lists every image
    pub num_to_visualize: Option<usize>,
    pub sort_by_filename: bool,
    pub include_image_links: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            num_to_visualize: Some(2000),
            sort_by_filename: false,
            include_image_links: true,
        }
    }
}

/// Write `index.html` under `output_dir` listing the images of the dataset at
/// `dataset_path` with their labels. Returns the page's path.
pub fn write_preview(
    dataset_path: &Path,
    image_base_dir: &Path,
    output_dir: &Path,
    options: &PreviewOptions,
) -> Result<PathBuf> {
    let dataset = read_dataset(dataset_path)?;
    ensure_directory(output_dir)?;
    let html_path = output_dir.join("index.html");

    let page = render_page(&dataset, image_base_dir, options);
    let mut writer = BufWriter::new(File::create(&html_path)?);
    writer.write_all(page.as_bytes())?;
    writer.flush()?;

    info!("Wrote preview to {}", html_path.display());
    Ok(html_path)
}

fn render_page(dataset: &Dataset, image_base_dir: &Path, options: &PreviewOptions) -> String {
    let category_names: HashMap<u32, &str> = dataset
        .categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();
    let mut labels: HashMap<&RecordId, Vec<&str>> = HashMap::new();
    for ann in &dataset.annotations {
        let name = category_names
            .get(&ann.category_id)
            .copied()
            .unwrap_or("?");
        let names = labels.entry(&ann.image_id).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let mut images: Vec<&ImageRecord> = dataset.images.iter().collect();
    if options.sort_by_filename {
        images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    }
    let shown = options
        .num_to_visualize
        .unwrap_or(images.len())
        .min(images.len());

    let mut html = String::with_capacity(shown * 160 + 512);
    html.push_str("<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Dataset preview</title>\n");
    html.push_str("<style>td, th { padding: 2px 8px; text-align: left; }</style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!(
        "<h1>Dataset preview</h1>\n<p>Showing {} of {} images</p>\n",
        shown,
        images.len()
    ));
    html.push_str(
        "<table>\n<tr><th>File</th><th>Categories</th><th>Habitat</th><th>Visibility</th><th>Filter</th></tr>\n",
    );

    for im in images.into_iter().take(shown) {
        let file_cell = if options.include_image_links {
            format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&image_base_dir.join(&im.file_name).to_string_lossy()),
                escape_html(&im.file_name)
            )
        } else {
            escape_html(&im.file_name)
        };
        let categories = labels
            .get(&im.id)
            .map(|names| names.join(", "))
            .unwrap_or_default();
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            file_cell,
            escape_html(&categories),
            escape_html(im.habitat_type.as_deref().unwrap_or("")),
            escape_html(im.visibility.as_deref().unwrap_or("")),
            im.filter.map(|f| f.to_string()).unwrap_or_default()
        ));
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
