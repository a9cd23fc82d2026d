//! FB2 `title-info` metadata.

use crate::book::{CoverImage, Metadata, Sequence};
use crate::dom::{ArenaDom, ArenaNodeId, normalize_whitespace};
use crate::error::{Error, Result};
use crate::normalize::{NormalizerConfig, classify_language, normalize_genre, parse_date};
use crate::select::Selection;

/// Extract metadata from a parsed FB2 document.
///
/// A document without `title-info` is corrupted; every other field is
/// optional. `fallback_name` names the book when `book-title` is missing.
pub fn extract_metadata(
    dom: &ArenaDom,
    fallback_name: &str,
    normalizer: &NormalizerConfig,
) -> Result<Metadata> {
    let title_info = Selection::document(dom)
        .select("description title-info")
        .or_tag("title-info")
        .first()
        .ok()
        .flatten()
        .ok_or_else(|| Error::CorruptedData("FB2 document has no title-info".to_string()))?;

    let select = |query: &str| Selection::new(dom, title_info).select(query).or_absent();

    let name = select("book-title").plain_text()?;
    let name = if name.is_empty() {
        fallback_name.to_string()
    } else {
        name
    };

    let authors: Vec<String> = select("author")
        .nodes()?
        .into_iter()
        .map(|author| author_name(dom, author))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|a| !a.is_empty())
        .collect();

    let annotation: Vec<String> = {
        let paragraphs = Selection::new(dom, title_info)
            .select("annotation p")
            .or_select("annotation")
            .or_absent();
        let count = paragraphs.nodes()?.len();
        (0..count)
            .map(|i| paragraphs.text_at(i))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect()
    };

    let genre_nodes = select("genre");
    let genres: Vec<String> = (0..genre_nodes.nodes()?.len())
        .map(|i| genre_nodes.plain_text_at(i).map(|g| normalize_genre(&g)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|g| !g.is_empty())
        .collect();

    let keywords = normalizer.normalize_keywords(&select("keywords").plain_text()?);

    let language = Selection::new(dom, title_info)
        .select("lang")
        .or_select("src-lang")
        .or_absent()
        .plain_text()
        .map(|lang| classify_language(&lang))?;

    Ok(Metadata {
        name,
        author: non_empty(authors.join(", ")),
        release_date: release_date(dom, title_info)?,
        annotation: non_empty_list(annotation),
        genres: non_empty_list(genres),
        keywords: non_empty_list(keywords),
        language,
        cover: cover(dom, title_info)?,
        sequence: sequence(dom, title_info)?,
    })
}

/// `First "Nick" Last` when all three parts exist, otherwise the parts that
/// do, space-separated.
fn author_name(dom: &ArenaDom, author: ArenaNodeId) -> Result<String> {
    let part = |tag: &str| {
        Selection::new(dom, author)
            .select(tag)
            .or_absent()
            .plain_text()
    };

    let first = part("first-name")?;
    let nick = part("nickname")?;
    let last = part("last-name")?;

    let nick = if !first.is_empty() && !nick.is_empty() && !last.is_empty() {
        format!("\"{nick}\"")
    } else {
        nick
    };

    Ok([first, nick, last]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

/// `title-info/date@value`, then its text, then the same for
/// `document-info/date`.
fn release_date(dom: &ArenaDom, title_info: ArenaNodeId) -> Result<Option<chrono::NaiveDate>> {
    let title_date = Selection::new(dom, title_info).select("date").or_absent();
    let document_date = Selection::document(dom)
        .select("description document-info date")
        .or_absent();

    let candidates = [
        title_date.attribute("value")?,
        Some(title_date.plain_text()?),
        document_date.attribute("value")?,
        Some(document_date.plain_text()?),
    ];

    Ok(candidates.into_iter().flatten().find_map(|raw| parse_date(&raw)))
}

/// The coverpage image reference resolved by id, else the first JPEG
/// binary in the document.
fn cover(dom: &ArenaDom, title_info: ArenaNodeId) -> Result<Option<CoverImage>> {
    let referenced = Selection::new(dom, title_info)
        .select("coverpage image")
        .or_absent()
        .attribute("href")?
        .and_then(|href| href.strip_prefix('#').map(str::to_string))
        .and_then(|id| dom.get_by_id(&id));

    let binary = match referenced {
        Some(binary) => Some(binary),
        None => Selection::document(dom)
            .select(r#"binary[content-type^="image/jpeg"]"#)
            .or_absent()
            .first()?,
    };

    Ok(binary.and_then(|id| {
        let data = dom.deep_text(id);
        if data.trim().is_empty() {
            log::warn!("fb2: cover binary is empty");
            return None;
        }
        Some(CoverImage::from_base64(&data, dom.get_attr(id, "content-type")))
    }))
}

/// `<sequence name="..." number="..."/>`; a missing or non-numeric number
/// is kept as `None`.
fn sequence(dom: &ArenaDom, title_info: ArenaNodeId) -> Result<Option<Sequence>> {
    let sequence = Selection::new(dom, title_info).select("sequence").or_absent();

    let Some(name) = sequence
        .attribute("name")?
        .map(|n| normalize_whitespace(&n))
        .filter(|n| !n.is_empty())
    else {
        return Ok(None);
    };

    let number = sequence
        .attribute("number")?
        .and_then(|n| n.trim().parse::<i64>().ok());

    Ok(Some(Sequence { name, number }))
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn non_empty_list(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::dom::parse_xml;

    fn extract(xml: &str) -> Result<Metadata> {
        let dom = parse_xml(xml).unwrap();
        extract_metadata(&dom, "fallback", &NormalizerConfig::default())
    }

    const FULL: &str = r##"<FictionBook xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <genre>sf_action</genre>
      <genre>sf_cyberpunk</genre>
      <author>
        <first-name>Ivan</first-name>
        <nickname>Grozny</nickname>
        <last-name>Vasilyev</last-name>
      </author>
      <author><nickname>Anon</nickname></author>
      <book-title>Night &amp; Day</book-title>
      <annotation>
        <p>First   line.</p>
        <p> </p>
        <p>Second <emphasis>line</emphasis>.</p>
      </annotation>
      <keywords>самиздат, litrpg, network_literature</keywords>
      <date value="2021-06-15">15 June 2021</date>
      <coverpage><image l:href="#cover.png"/></coverpage>
      <lang>ru</lang>
      <sequence name="Cycle" number="3"/>
    </title-info>
  </description>
  <body><section><p>x</p></section></body>
  <binary id="other.jpg" content-type="image/jpeg">AAAA</binary>
  <binary id="cover.png" content-type="image/png">iVBORw0K
GgoAAAA</binary>
</FictionBook>"##;

    #[test]
    fn test_full_title_info() {
        let metadata = extract(FULL).unwrap();

        assert_eq!(metadata.name, "Night & Day");
        assert_eq!(metadata.author.as_deref(), Some("Ivan \"Grozny\" Vasilyev, Anon"));
        assert_eq!(metadata.release_date, NaiveDate::from_ymd_opt(2021, 6, 15));
        assert_eq!(
            metadata.annotation,
            Some(vec![
                "First line.".to_string(),
                "Second <emphasis>line</emphasis>.".to_string()
            ])
        );
        assert_eq!(
            metadata.genres,
            Some(vec!["Action".to_string(), "Cyberpunk".to_string()])
        );
        assert_eq!(
            metadata.keywords,
            Some(vec!["ЛитРПГ".to_string(), "Network literature".to_string()])
        );
        assert_eq!(metadata.language.as_deref(), Some("ru"));

        let cover = metadata.cover.unwrap();
        assert_eq!(cover.encoding(), "png");
        assert_eq!(cover.payload(), "data:image/png;base64,iVBORw0KGgoAAAA");

        assert_eq!(
            metadata.sequence,
            Some(Sequence {
                name: "Cycle".to_string(),
                number: Some(3)
            })
        );
    }

    #[test]
    fn test_minimal_title_info() {
        let metadata = extract(
            "<FictionBook><description><title-info><author><first-name>A</first-name><last-name>B</last-name></author></title-info></description></FictionBook>",
        )
        .unwrap();

        assert_eq!(metadata.name, "fallback");
        assert_eq!(metadata.author.as_deref(), Some("A B"));
        assert_eq!(metadata.release_date, None);
        assert_eq!(metadata.annotation, None);
        assert_eq!(metadata.genres, None);
        assert_eq!(metadata.keywords, None);
        assert_eq!(metadata.language, None);
        assert_eq!(metadata.cover, None);
        assert_eq!(metadata.sequence, None);
    }

    #[test]
    fn test_missing_title_info_is_corrupted() {
        let result = extract("<FictionBook><description/></FictionBook>");
        assert!(matches!(result, Err(Error::CorruptedData(_))));
    }

    #[test]
    fn test_fallbacks() {
        let metadata = extract(
            r#"<FictionBook><description>
                <title-info>
                    <annotation>Plain annotation</annotation>
                    <src-lang>en</src-lang>
                    <sequence name="Saga" number="first"/>
                </title-info>
                <document-info><date value="2010-02-03"/></document-info>
            </description>
            <binary id="c" content-type="image/jpeg">/9j/</binary></FictionBook>"#,
        )
        .unwrap();

        assert_eq!(metadata.annotation, Some(vec!["Plain annotation".to_string()]));
        assert_eq!(metadata.language.as_deref(), Some("en"));
        assert_eq!(metadata.release_date, NaiveDate::from_ymd_opt(2010, 2, 3));
        assert_eq!(metadata.cover.unwrap().payload(), "data:image/jpeg;base64,/9j/");
        assert_eq!(
            metadata.sequence,
            Some(Sequence {
                name: "Saga".to_string(),
                number: None
            })
        );
    }

    #[test]
    fn test_date_text_when_value_missing() {
        let metadata = extract(
            "<FictionBook><description><title-info><date>2005</date></title-info></description></FictionBook>",
        )
        .unwrap();
        assert_eq!(metadata.release_date, NaiveDate::from_ymd_opt(2005, 1, 1));
    }
}
