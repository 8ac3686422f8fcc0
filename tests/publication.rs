use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};

use epub_packer::{
    ContentPlacement, EpubError, Publication,
    builder::{DEFAULT_CHAPTER_FOOTER, DEFAULT_CHAPTER_HEADER},
};
use zip::ZipArchive;

const PNG: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> String {
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("{} is missing", name))
        .read_to_string(&mut content)
        .unwrap();
    content
}

fn open(path: &Path) -> ZipArchive<File> {
    ZipArchive::new(File::open(path).unwrap()).unwrap()
}

#[test]
fn test_round_trip_single_chapter() {
    let base = tempfile::tempdir().unwrap();
    let output = base.path().join("out.epub");

    let mut publication = Publication::new(base.path()).unwrap();
    let identifier = publication.identifier().to_string();
    publication.set_title("T");
    publication
        .add_book("Book1")
        .add_chapter_html("<p>Hi</p>", None)
        .unwrap();

    publication.build(&output).unwrap();

    let mut archive = open(&output);
    assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");
    assert_eq!(read_entry(&mut archive, "mimetype"), "application/epub+zip");

    let container = read_entry(&mut archive, "META-INF/container.xml");
    assert!(container.contains("full-path=\"OEBPS/content.opf\""));

    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>T</dc:title>"));
    assert!(opf.contains(&format!(
        "<dc:identifier id=\"uuid_id\" opf:scheme=\"uuid\">{}</dc:identifier>",
        identifier
    )));
    assert!(opf.contains(concat!(
        "<item href=\"Text/b01c001.html\" id=\"txtb01c001.html\" ",
        "media-type=\"application/xhtml+xml\"/>"
    )));
    assert!(opf.contains("<itemref idref=\"txtb01c001.html\"/>"));
    assert!(!opf.contains("<guide>"));

    let chapter = read_entry(&mut archive, "OEBPS/Text/b01c001.html");
    assert_eq!(
        chapter,
        format!("{}<p>Hi</p>{}", DEFAULT_CHAPTER_HEADER, DEFAULT_CHAPTER_FOOTER)
    );

    let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");
    assert_eq!(ncx.matches("<navPoint").count(), 1);
    assert!(ncx.contains("playOrder=\"1\""));
    assert!(ncx.contains("<content src=\"Text/b01c001.html\"/>"));
    assert!(ncx.contains(&format!("content=\"{}\"", identifier)));
}

#[test]
fn test_multiple_books_navigation() {
    let base = tempfile::tempdir().unwrap();
    let output = base.path().join("books.epub");

    let mut publication = Publication::new(base.path()).unwrap();
    for title in ["First", "Second"] {
        let book = publication.add_book(title);
        book.add_chapter_html("<p>a</p>", None).unwrap().set_title("A");
        book.add_chapter_html("<p>b</p>", None).unwrap().set_title("B");
    }
    publication.build(&output).unwrap();

    let mut archive = open(&output);
    let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");

    assert_eq!(ncx.matches("class=\"book\"").count(), 2);
    assert_eq!(ncx.matches("class=\"chapter\"").count(), 4);
    assert!(ncx.contains("id=\"book1\""));
    assert!(ncx.contains("id=\"book2\""));

    let orders = ncx
        .match_indices("playOrder=\"")
        .map(|(index, pattern)| {
            let rest = &ncx[index + pattern.len()..];
            rest[..rest.find('"').unwrap()].parse::<usize>().unwrap()
        })
        .collect::<Vec<usize>>();
    assert_eq!(orders, vec![1, 2, 3, 4]);

    // Book entries nest their chapters: book2 opens after b01c002 and before b02c001.
    let book2 = ncx.find("id=\"book2\"").unwrap();
    assert!(ncx.find("Text/b01c002.html").unwrap() < book2);
    assert!(book2 < ncx.find("Text/b02c001.html").unwrap());
    assert!(ncx.contains("<content src=\"\"/>"));

    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    let spine = &opf[opf.find("<spine").unwrap()..];
    let refs = ["b01c001", "b01c002", "b02c001", "b02c002"]
        .iter()
        .map(|name| spine.find(&format!("idref=\"txt{}.html\"", name)).unwrap())
        .collect::<Vec<usize>>();
    assert!(refs.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_wrap_disabled_chapter_is_untouched() {
    let base = tempfile::tempdir().unwrap();
    let output = base.path().join("wrap.epub");

    let mut publication = Publication::new(base.path()).unwrap();
    publication
        .set_chapter_header("<header/>")
        .set_chapter_footer("<footer/>");
    let book = publication.add_book("Book1");
    book.add_chapter_html("<p>wrapped</p>", None).unwrap();
    book.add_chapter_html("<html><p>as is</p></html>", None)
        .unwrap()
        .set_wrap(false);
    publication.build(&output).unwrap();

    let mut archive = open(&output);
    assert_eq!(
        read_entry(&mut archive, "OEBPS/Text/b01c001.html"),
        "<header/><p>wrapped</p><footer/>"
    );
    assert_eq!(
        read_entry(&mut archive, "OEBPS/Text/b01c002.html"),
        "<html><p>as is</p></html>"
    );
}

#[test]
fn test_entity_decoding_can_be_disabled() {
    let base = tempfile::tempdir().unwrap();
    let output = base.path().join("entities.epub");

    let mut publication = Publication::new(base.path()).unwrap();
    publication
        .set_decode_entities(false)
        .set_chapter_header("")
        .set_chapter_footer("");
    publication
        .add_book("Book1")
        .add_chapter_html("<p>&eacute;</p>", None)
        .unwrap();
    publication.build(&output).unwrap();

    let mut archive = open(&output);
    assert_eq!(
        read_entry(&mut archive, "OEBPS/Text/b01c001.html"),
        "<p>&eacute;</p>"
    );
}

#[test]
fn test_full_publication() {
    let base = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let output = base.path().join("full.epub");

    let cover = sources.path().join("cover.png");
    fs::write(&cover, PNG).unwrap();
    let style = sources.path().join("main.css");
    fs::write(&style, "p { text-indent: 1em; }").unwrap();
    let figure = sources.path().join("figure.png");
    fs::write(&figure, PNG).unwrap();
    let chapter_file = sources.path().join("second.html");
    fs::write(&chapter_file, "<p><img src=\"../Images/figure.png\"/></p>").unwrap();

    let mut publication = Publication::new(base.path()).unwrap();
    publication
        .set_title("Stories")
        .set_language("cs")
        .set_publisher("Press")
        .set_description("A collection")
        .add_subject("fiction")
        .add_subject("short stories")
        .add_creator("aut", "Jane Doe", Some("Doe, Jane"))
        .place_content("Contents", ContentPlacement::End);
    publication
        .set_cover(&cover, Some("Front"))
        .unwrap()
        .add_style(&style)
        .unwrap()
        .add_image(&figure)
        .unwrap();

    let book = publication.add_book("Stories");
    book.add_chapter_html("<p>one</p>", None).unwrap().set_title("One");
    let second = book.add_chapter_file(&chapter_file, None).unwrap();
    assert_eq!(second.images(), ["../Images/figure.png"]);
    second.set_title("Two");

    publication.build(&output).unwrap();

    let mut archive = open(&output);
    let opf = read_entry(&mut archive, "OEBPS/content.opf");

    for expected in [
        "<dc:creator opf:file-as=\"Doe, Jane\" opf:role=\"aut\">Jane Doe</dc:creator>",
        "<dc:description>A collection</dc:description>",
        "<dc:language>cs</dc:language>",
        "<dc:publisher>Press</dc:publisher>",
        "<meta name=\"cover\" content=\"cvrcover.png\"/>",
        "<dc:subject>short stories</dc:subject>",
        "<item href=\"Images/cover.png\" id=\"cvrcover.png\" media-type=\"image/png\"/>",
        "<item href=\"Styles/main.css\" id=\"cssmain.css\" media-type=\"text/css\"/>",
        "<item href=\"Images/figure.png\" id=\"imgfigure.png\" media-type=\"image/png\"/>",
        concat!(
            "<item href=\"Text/content.html\" id=\"txtcontent.html\" ",
            "media-type=\"application/xhtml+xml\"/>"
        ),
    ] {
        assert!(opf.contains(expected), "{} is missing", expected);
    }
    assert!(opf.contains("<reference type=\"cover\" title=\"Front\" href=\"Text/cover.xhtml\"/>"));

    // cover image + cover page + 3 chapters + style + image + toc
    assert_eq!(opf.matches("<item ").count(), 8);
    assert_eq!(opf.matches("idref=\"cover.xhtml\"").count(), 1);
    let spine = &opf[opf.find("<spine").unwrap()..];
    assert!(spine.find("cover.xhtml").unwrap() < spine.find("txtb01c001.html").unwrap());
    assert!(spine.find("txtb01c002.html").unwrap() < spine.find("txtcontent.html").unwrap());

    let cover_page = read_entry(&mut archive, "OEBPS/Text/cover.xhtml");
    assert!(cover_page.contains("src=\"../Images/cover.png\""));

    let contents = read_entry(&mut archive, "OEBPS/Text/content.html");
    assert!(contents.contains("<a href=\"b01c001.html\">One</a>"));
    assert!(contents.contains("<a href=\"b01c002.html\">Two</a>"));

    let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");
    assert!(ncx.contains("xml:lang=\"cs\""));
    assert!(ncx.contains("<text>Stories</text>"));
    assert!(ncx.contains("playOrder=\"3\""));
    assert!(ncx.contains("<content src=\"Text/content.html\"/>"));

    for entry in ["OEBPS/Styles/main.css", "OEBPS/Images/figure.png", "OEBPS/Images/cover.png"] {
        assert!(archive.by_name(entry).is_ok(), "{} is missing", entry);
    }
}

#[test]
fn test_hooks_run_before_emission() {
    let base = tempfile::tempdir().unwrap();
    let output = base.path().join("hooks.epub");

    let mut publication = Publication::new(base.path()).unwrap();
    publication.set_before_build(|publication| {
        publication.set_title("Hooked title");
        Ok(())
    });
    publication
        .add_book("Book1")
        .add_chapter_html("<p>a</p>", None)
        .unwrap()
        .set_before_build(|chapter| {
            chapter.set_title("Hooked chapter");
            Ok(())
        });
    publication.build(&output).unwrap();

    let mut archive = open(&output);
    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>Hooked title</dc:title>"));
    assert!(read_entry(&mut archive, "OEBPS/toc.ncx").contains("<text>Hooked chapter</text>"));
}

#[test]
fn test_failed_build_removes_workspace() {
    let base = tempfile::tempdir().unwrap();
    let output = base.path().join("failed.epub");

    let mut publication = Publication::new(base.path()).unwrap();
    let workspace = publication.workspace_path().to_path_buf();
    publication.add_book("One");
    publication.add_book("Two");
    publication.place_content("Contents", ContentPlacement::End);

    let result = publication.build(&output);
    assert!(matches!(
        result,
        Err(EpubError::UnsupportedConfiguration { .. })
    ));
    assert!(!workspace.exists());
    assert!(!output.exists());
}

#[test]
fn test_drop_removes_workspace() {
    let base = tempfile::tempdir().unwrap();

    let publication = Publication::new(base.path()).unwrap();
    let workspace = publication.workspace_path().to_path_buf();
    assert!(workspace.is_dir());

    drop(publication);
    assert!(!workspace.exists());
}

#[test]
fn test_invalid_base_directory() {
    let base = tempfile::tempdir().unwrap();

    let result = Publication::new(base.path().join("missing"));
    assert!(matches!(result, Err(EpubError::InputError { .. })));
}
