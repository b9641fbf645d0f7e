use crate::error::{Error, Result};
use crate::generator::{
    Generator, GeneratorOptions, PageEntry, create_output, escape_xml, render_template,
};
use crate::log_scope::LogScope;
use crate::types::{Direction, EbookMetadata, get_file_info};
use async_trait::async_trait;
use log::debug;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const COMIC_INFO_TEMPLATE: &str = include_str!("../../templates/ComicInfo.xml");

/// A `<Page>` element of ComicInfo.xml.
#[derive(Debug, Clone, PartialEq)]
struct ComicInfoPage {
    image: usize,
    bookmark: Option<String>,
    is_cover: bool,
}

/// A generator for creating CBZ (Comic Book ZIP) files.
///
/// Pages are stored flat as `00000.ext`, `00001.ext`, ... numbered across the
/// whole archive; chapter structure survives only as ComicInfo.xml bookmarks.
pub struct Cbz {
    zip: Option<ZipWriter<File>>,
    options: SimpleFileOptions,
    metadata: EbookMetadata,
    reading_direction: Direction,
    scope: LogScope,
    page_index: usize, // 0-based index for pages added
    pages: Vec<ComicInfoPage>,
}

impl Cbz {
    fn render_comic_info(&self) -> String {
        let meta = &self.metadata;
        let optional = |tag: &str, value: Option<String>| -> String {
            value
                .filter(|v| !v.is_empty())
                .map(|v| format!("  <{tag}>{}</{tag}>\n", escape_xml(&v)))
                .unwrap_or_default()
        };

        let summary = optional("Summary", meta.description.clone());
        let writer = optional("Writer", Some(meta.authors.join(",")));
        let publisher = optional("Publisher", meta.publisher.clone());
        let genre = optional("Genre", Some(meta.subjects.join(",")));

        // Only pages that carry a bookmark or mark the cover are listed.
        let pages: String = self
            .pages
            .iter()
            .filter(|p| p.bookmark.is_some() || p.is_cover)
            .map(|p| {
                let mut attrs = format!("Image=\"{}\"", p.image);
                if p.is_cover {
                    attrs.push_str(" Type=\"FrontCover\"");
                }
                if let Some(bookmark) = &p.bookmark {
                    attrs.push_str(&format!(" Bookmark=\"{}\"", escape_xml(bookmark)));
                }
                format!("    <Page {} />\n", attrs)
            })
            .collect();

        let manga = match self.reading_direction {
            Direction::Ltr => "No",
            Direction::Rtl => "YesAndRightToLeft",
        };
        let title = escape_xml(&meta.title);
        let page_count = self.page_index.to_string();
        let language = escape_xml(&meta.language);

        render_template(
            COMIC_INFO_TEMPLATE,
            &[
                ("title", title.as_str()),
                ("summary", summary.as_str()),
                ("writer", writer.as_str()),
                ("publisher", publisher.as_str()),
                ("genre", genre.as_str()),
                ("pagecount", page_count.as_str()),
                ("language", language.as_str()),
                ("manga", manga),
                ("pages", pages.as_str()),
            ],
        )
    }
}

#[async_trait]
impl Generator for Cbz {
    fn new(
        output_file: &Path,
        metadata: &EbookMetadata,
        options: &GeneratorOptions,
        scope: LogScope,
    ) -> Result<Self> {
        let zip_options: SimpleFileOptions = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let file = create_output(output_file)?;
        let zip = ZipWriter::new(file);

        Ok(Cbz {
            zip: Some(zip),
            options: zip_options,
            metadata: metadata.clone(),
            reading_direction: options.reading_direction,
            scope,
            page_index: 0,
            pages: Vec::new(),
        })
    }

    async fn add_page(&mut self, page: PageEntry) -> Result<&mut Self> {
        let (image_extension, _) = get_file_info(&page.extension)?;
        let file_name = format!("{:05}.{}", self.page_index, image_extension);

        let zip = match self.zip.as_mut() {
            Some(z) => z,
            None => {
                return Err(Error::Unsupported("Zip writer not available".to_string()));
            }
        };
        zip.start_file(file_name.as_str(), self.options)?;
        zip.write_all(&page.data)?;
        debug!("{} Added {}", self.scope, file_name);

        self.pages.push(ComicInfoPage {
            image: self.page_index,
            bookmark: page.nav_label,
            is_cover: page.is_cover,
        });
        self.page_index += 1;

        Ok(self)
    }

    async fn save(mut self) -> Result<()> {
        let xml = self.render_comic_info();
        let options = self.options;

        // Take ownership of the zip writer
        let mut zip = match self.zip.take() {
            Some(z) => z,
            None => {
                return Err(Error::Unsupported("Zip writer not available".to_string()));
            }
        };

        // Finish writing the zip file in a blocking task
        spawn_blocking(move || -> Result<()> {
            zip.start_file("ComicInfo.xml", options)?;
            zip.write_all(xml.as_bytes())?;
            zip.finish()?;
            Ok(())
        })
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;
    use zip::ZipArchive;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tankobon-cbz-{}", rand::random::<u64>()))
            .join(name)
    }

    #[tokio::test]
    async fn test_entries_and_escaped_comic_info() {
        let path = temp_file("comic.cbz");
        let mut metadata = EbookMetadata::default_with_title(r#"Fish & "Chips" <3"#.to_string());
        metadata.authors = vec!["Smith & Wesson".to_string(), "O'Neil".to_string()];
        metadata.publisher = Some("<Press>".to_string());
        metadata.subjects = vec!["Comedy".to_string(), "Food".to_string()];

        let mut cbz = Cbz::new(&path, &metadata, &GeneratorOptions::default(), LogScope::default()).unwrap();
        cbz.add_page(PageEntry::cover(vec![9], ".jpg")).await.unwrap();
        cbz.add_page(PageEntry::new(vec![1], "png").labeled("A", "0").with_nav_label("Chapter <1>"))
            .await
            .unwrap();
        cbz.add_page(PageEntry::new(vec![2], "webp").labeled("A", "1")).await.unwrap();
        cbz.add_page(PageEntry::new(vec![3], "jpeg").labeled("B", "0").with_nav_label("B & C"))
            .await
            .unwrap();
        cbz.save().await.unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 4 + 1);
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        for name in ["00000.jpg", "00001.png", "00002.webp", "00003.jpg"] {
            assert!(names.iter().any(|n| n == name), "missing {}", name);
        }
        assert_eq!(archive.by_index(4).unwrap().name(), "ComicInfo.xml");

        let mut xml = String::new();
        archive
            .by_name("ComicInfo.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("<Title>Fish &amp; &quot;Chips&quot; &lt;3</Title>"));
        assert!(xml.contains("<Writer>Smith &amp; Wesson,O&apos;Neil</Writer>"));
        assert!(xml.contains("<Publisher>&lt;Press&gt;</Publisher>"));
        assert!(xml.contains("<Genre>Comedy,Food</Genre>"));
        assert!(xml.contains("<PageCount>4</PageCount>"));
        assert!(xml.contains("<Page Image=\"0\" Type=\"FrontCover\" />"));
        assert!(xml.contains("<Page Image=\"1\" Bookmark=\"Chapter &lt;1&gt;\" />"));
        assert!(xml.contains("<Page Image=\"3\" Bookmark=\"B &amp; C\" />"));
        assert!(!xml.contains("Image=\"2\""));
        assert!(!xml.contains("<Summary>"));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
