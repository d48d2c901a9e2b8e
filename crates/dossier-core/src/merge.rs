//! The attachment-merge routine.
//!
//! Pure computation: given the declared MIME types and stored payloads of a
//! record's attachments, produce the merged artifact (or none). Persistence
//! of the result is the caller's concern, which keeps this module testable
//! without a database.
//!
//! Policy, by count of qualifying attachments (PDF MIME type, non-empty
//! decoded payload, user origin; the origin filter happens at the read
//! path):
//! - 0 → no artifact
//! - 1 → artifact is a byte-for-byte copy of the payload, named
//!   `document_fusionne.pdf`
//! - ≥2 → artifact is the in-order page concatenation of all payloads,
//!   named `documents_fusionnes.pdf`

use std::collections::BTreeMap;

use base64::Engine;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::defaults::{MERGED_MULTI_NAME, MERGED_SINGLE_NAME, PDF_MIME};
use crate::error::{Error, Result};
use crate::models::MergedArtifact;

/// One input to the merge computation: declared MIME type plus the payload
/// exactly as stored (transit form, normally base64 text).
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub content_type: String,
    pub payload: Vec<u8>,
}

/// Decode a transit payload to raw bytes.
///
/// Payloads normally arrive base64-encoded. A payload that fails strict
/// decoding is treated as already-raw bytes: recovery is non-fatal and
/// logged as a warning (rows written by external tools may store raw
/// binary).
pub fn decode_transit_payload(payload: &[u8]) -> Vec<u8> {
    match base64::engine::general_purpose::STANDARD.decode(payload) {
        Ok(decoded) => decoded,
        Err(_) => {
            warn!(
                subsystem = "merge",
                payload_len = payload.len(),
                "Payload is not valid base64, treating as raw bytes"
            );
            payload.to_vec()
        }
    }
}

/// Compute the merged artifact for an ordered attachment set.
///
/// Returns `Ok(None)` when no attachment qualifies. Deterministic:
/// identical inputs produce byte-identical output.
///
/// # Errors
///
/// `Error::Merge` when two or more attachments qualify and any of them
/// fails to parse as a PDF. The single-attachment path never parses: the
/// artifact is an exact copy, corrupt or not.
pub fn compute_merged_artifact(sources: &[SourceDocument]) -> Result<Option<MergedArtifact>> {
    let mut qualifying: Vec<Vec<u8>> = sources
        .iter()
        .filter(|s| s.content_type == PDF_MIME)
        .map(|s| decode_transit_payload(&s.payload))
        .filter(|bytes| !bytes.is_empty())
        .collect();

    debug!(
        subsystem = "merge",
        op = "compute",
        source_count = sources.len(),
        qualifying_count = qualifying.len(),
        "Computed qualifying attachment set"
    );

    if qualifying.is_empty() {
        return Ok(None);
    }

    if qualifying.len() == 1 {
        let data = qualifying.remove(0);
        return Ok(Some(MergedArtifact {
            data,
            filename: MERGED_SINGLE_NAME.to_string(),
        }));
    }

    let data = merge_documents(&qualifying)?;
    Ok(Some(MergedArtifact {
        data,
        filename: MERGED_MULTI_NAME.to_string(),
    }))
}

/// Page attributes a PDF page may inherit from ancestor page-tree nodes.
/// The merge flattens the source page trees, so inherited values must be
/// copied down onto each page before its original ancestors are dropped.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Merge two or more PDF documents into one, preserving page order.
///
/// Object model surgery: every input is renumbered into a shared ID space,
/// all non-page-tree objects are carried over, and a fresh page tree and
/// catalog are built over the collected pages.
pub fn merge_documents(payloads: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut collected_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut collected_pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut max_id: u32 = 1;

    for (index, payload) in payloads.iter().enumerate() {
        let mut doc = Document::load_mem(payload)
            .map_err(|e| Error::Merge(format!("input document {} failed to parse: {}", index, e)))?;

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(Error::Merge(format!("input document {} has no pages", index)));
        }

        for page_id in page_ids {
            let mut page = doc
                .get_object(page_id)
                .and_then(|o| o.as_dict())
                .map_err(|e| {
                    Error::Merge(format!("input document {} has a bad page object: {}", index, e))
                })?
                .clone();
            inline_inherited_attributes(&doc, &mut page);
            collected_pages.push((page_id, page));
        }

        for (object_id, object) in std::mem::take(&mut doc.objects) {
            let kind: &[u8] = dict_type(&object).unwrap_or(b"");
            // Page-tree and outline nodes are rebuilt or dropped; everything
            // else (fonts, streams, annotations, ...) is carried over.
            if kind == b"Catalog"
                || kind == b"Pages"
                || kind == b"Page"
                || kind == b"Outlines"
                || kind == b"Outline"
            {
                continue;
            }
            collected_objects.insert(object_id, object);
        }
    }

    let pages_root_id: ObjectId = (max_id, 0);
    let catalog_id: ObjectId = (max_id + 1, 0);

    let mut merged = Document::with_version("1.5");
    merged.objects = collected_objects;

    let kids: Vec<Object> = collected_pages
        .iter()
        .map(|(id, _)| Object::Reference(*id))
        .collect();
    let page_count = kids.len() as i64;

    for (page_id, mut page) in collected_pages {
        page.set("Parent", Object::Reference(pages_root_id));
        merged.objects.insert(page_id, Object::Dictionary(page));
    }

    merged.objects.insert(
        pages_root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_root_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);
    merged.max_id = catalog_id.0;
    merged.renumber_objects();

    let mut buffer = Vec::new();
    merged
        .save_to(&mut buffer)
        .map_err(|e| Error::Merge(format!("failed to serialize merged document: {}", e)))?;

    debug!(
        subsystem = "merge",
        op = "merge_documents",
        input_count = payloads.len(),
        page_count,
        payload_len = buffer.len(),
        "Merged documents"
    );

    Ok(buffer)
}

/// The `/Type` name of a dictionary object, if it has one.
fn dict_type(object: &Object) -> Option<&[u8]> {
    match object.as_dict().ok()?.get(b"Type").ok()? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Copy inheritable page attributes down from ancestor page-tree nodes
/// onto a page dictionary, where the page does not define them itself.
fn inline_inherited_attributes(doc: &Document, page: &mut Dictionary) {
    let mut ancestor = parent_ref(page);
    // Depth guard: a well-formed page tree is shallow; a cyclic Parent
    // chain must not hang the merge.
    let mut depth = 0;
    while let Some(id) = ancestor {
        if depth > 64 {
            break;
        }
        depth += 1;

        let node = match doc.get_object(id).and_then(|o| o.as_dict()) {
            Ok(dict) => dict,
            Err(_) => break,
        };
        for key in INHERITABLE_PAGE_KEYS {
            if page.get(key).is_err() {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        ancestor = parent_ref(node);
    }
}

fn parent_ref(dict: &Dictionary) -> Option<ObjectId> {
    match dict.get(b"Parent") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::Stream;

    /// Build a small real PDF with `pages` pages, each carrying a text
    /// marker `"<label> <n>"` in its content stream.
    fn build_pdf(pages: usize, label: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for n in 0..pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("{} {}", label, n + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("content encodes"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        // Resources and MediaBox live on the page-tree node, exercising
        // attribute inheritance in the merge.
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("test PDF saves");
        buf
    }

    fn b64(data: &[u8]) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .encode(data)
            .into_bytes()
    }

    fn pdf_source(payload: Vec<u8>) -> SourceDocument {
        SourceDocument {
            content_type: PDF_MIME.to_string(),
            payload,
        }
    }

    fn page_count(data: &[u8]) -> usize {
        Document::load_mem(data).expect("output parses").get_pages().len()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_no_sources_yields_no_artifact() {
        assert_eq!(compute_merged_artifact(&[]).unwrap(), None);
    }

    #[test]
    fn test_non_pdf_sources_yield_no_artifact() {
        let sources = vec![
            SourceDocument {
                content_type: "image/png".to_string(),
                payload: b64(&build_pdf(1, "png-disguise")),
            },
            SourceDocument {
                content_type: "text/plain".to_string(),
                payload: b64(b"hello"),
            },
        ];
        assert_eq!(compute_merged_artifact(&sources).unwrap(), None);
    }

    #[test]
    fn test_empty_payload_does_not_qualify() {
        let sources = vec![pdf_source(Vec::new())];
        assert_eq!(compute_merged_artifact(&sources).unwrap(), None);
    }

    #[test]
    fn test_single_pdf_is_exact_copy() {
        let pdf = build_pdf(1, "solo");
        let artifact = compute_merged_artifact(&[pdf_source(b64(&pdf))])
            .unwrap()
            .expect("one qualifying attachment produces an artifact");
        assert_eq!(artifact.data, pdf);
        assert_eq!(artifact.filename, MERGED_SINGLE_NAME);
    }

    #[test]
    fn test_single_raw_payload_falls_back_without_decoding() {
        // Raw PDF bytes are not valid base64 ('%' is outside the alphabet),
        // so the fallback path must hand them through untouched.
        let pdf = build_pdf(1, "raw");
        let artifact = compute_merged_artifact(&[pdf_source(pdf.clone())])
            .unwrap()
            .expect("raw payload still qualifies");
        assert_eq!(artifact.data, pdf);
    }

    #[test]
    fn test_single_corrupt_pdf_is_still_copied_verbatim() {
        let junk = b"%PDF-1.5 truncated garbage".to_vec();
        let artifact = compute_merged_artifact(&[pdf_source(junk.clone())])
            .unwrap()
            .expect("single attachment is never parsed");
        assert_eq!(artifact.data, junk);
        assert_eq!(artifact.filename, MERGED_SINGLE_NAME);
    }

    #[test]
    fn test_two_pdfs_merge_page_counts() {
        let a = build_pdf(1, "alpha");
        let b = build_pdf(2, "beta");
        let artifact = compute_merged_artifact(&[pdf_source(b64(&a)), pdf_source(b64(&b))])
            .unwrap()
            .expect("two qualifying attachments merge");
        assert_eq!(artifact.filename, MERGED_MULTI_NAME);
        assert_eq!(page_count(&artifact.data), 3);
    }

    #[test]
    fn test_merge_preserves_attachment_and_page_order() {
        let a = build_pdf(1, "alpha");
        let b = build_pdf(2, "beta");
        let artifact = compute_merged_artifact(&[pdf_source(b64(&a)), pdf_source(b64(&b))])
            .unwrap()
            .unwrap();

        let merged = Document::load_mem(&artifact.data).unwrap();
        let pages = merged.get_pages();
        assert_eq!(pages.len(), 3);

        let markers: [&[u8]; 3] = [b"alpha 1", b"beta 1", b"beta 2"];
        for (page_no, marker) in (1u32..=3).zip(markers) {
            let content = merged
                .get_page_content(pages[&page_no])
                .expect("merged page has readable content");
            assert!(
                contains(&content, marker),
                "page {} should carry marker {:?}",
                page_no,
                String::from_utf8_lossy(marker)
            );
        }
    }

    #[test]
    fn test_merged_pages_inherit_tree_attributes() {
        let a = build_pdf(1, "alpha");
        let b = build_pdf(1, "beta");
        let artifact = compute_merged_artifact(&[pdf_source(b64(&a)), pdf_source(b64(&b))])
            .unwrap()
            .unwrap();

        let merged = Document::load_mem(&artifact.data).unwrap();
        for (_, page_id) in merged.get_pages() {
            let page = merged.get_object(page_id).unwrap().as_dict().unwrap();
            assert!(
                page.get(b"MediaBox").is_ok(),
                "flattened pages must carry the MediaBox their old parent held"
            );
            assert!(page.get(b"Resources").is_ok());
        }
    }

    #[test]
    fn test_non_pdf_excluded_from_merge() {
        let a = build_pdf(1, "alpha");
        let png = SourceDocument {
            content_type: "image/png".to_string(),
            payload: b64(&build_pdf(5, "not-counted")),
        };
        let b = build_pdf(2, "beta");
        let artifact =
            compute_merged_artifact(&[pdf_source(b64(&a)), png, pdf_source(b64(&b))])
                .unwrap()
                .unwrap();
        assert_eq!(page_count(&artifact.data), 3);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let sources = vec![
            pdf_source(b64(&build_pdf(1, "alpha"))),
            pdf_source(b64(&build_pdf(2, "beta"))),
        ];
        let first = compute_merged_artifact(&sources).unwrap().unwrap();
        let second = compute_merged_artifact(&sources).unwrap().unwrap();
        assert_eq!(first.data, second.data, "same inputs must yield identical bytes");
        assert_eq!(first.filename, second.filename);
    }

    #[test]
    fn test_corrupt_input_among_many_is_a_merge_error() {
        let sources = vec![
            pdf_source(b64(&build_pdf(1, "alpha"))),
            pdf_source(b64(b"%PDF-1.5 truncated garbage")),
        ];
        match compute_merged_artifact(&sources) {
            Err(Error::Merge(msg)) => assert!(msg.contains("failed to parse")),
            other => panic!("expected Merge error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_transit_payload_roundtrip() {
        let raw = b"binary \x00\x01\x02 payload";
        assert_eq!(decode_transit_payload(&b64(raw)), raw);
    }

    #[test]
    fn test_decode_transit_payload_raw_fallback() {
        let raw = b"%not base64 at all%";
        assert_eq!(decode_transit_payload(raw), raw.to_vec());
    }
}
