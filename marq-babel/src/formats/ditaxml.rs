//! DITA-flavored XML backend.
//!
//! Emits topic-body fragments. The tag vocabulary is a pragmatic subset, not
//! a validated DITA map; structure mirrors the atom pairs one to one, which
//! the parser guarantees are properly nested, so every `*Right` atom can
//! close its tag without a stack. The only carried state is the target of
//! the last `Link` atom, consumed by the following link formatting span.

use crate::backend::Backend;
use crate::formats::xml_escape;
use marq_parser::marq::atoms::{
    FORMATTING_BOLD, FORMATTING_INDEX, FORMATTING_ITALIC, FORMATTING_LINK, FORMATTING_PARAMETER,
    FORMATTING_SPAN, FORMATTING_SUBSCRIPT, FORMATTING_SUPERSCRIPT, FORMATTING_TELETYPE,
    FORMATTING_UICONTROL, FORMATTING_UNDERLINE,
};
use marq_parser::{Atom, AtomType, CodeMarker};

#[derive(Debug, Default)]
pub struct DitaXmlBackend {
    pending_link: Option<String>,
}

impl DitaXmlBackend {
    pub fn new() -> DitaXmlBackend {
        DitaXmlBackend::default()
    }
}

/// Container element for a list style string.
fn list_tag(style: &str) -> &'static str {
    match style {
        "numeric" | "loweralpha" | "upperalpha" | "lowerroman" | "upperroman" => "ol",
        "tag" | "value" => "dl",
        _ => "ul",
    }
}

/// Item element inside the container `list_tag` picks.
fn list_item_tag(style: &str) -> &'static str {
    if list_tag(style) == "dl" {
        "dd"
    } else {
        "li"
    }
}

/// Inline element for a formatting span name, `None` for the spans that need
/// special handling (links, `span` with attributes).
fn formatting_tag(name: &str) -> Option<&'static str> {
    match name {
        FORMATTING_BOLD => Some("b"),
        FORMATTING_INDEX => Some("indexterm"),
        FORMATTING_ITALIC => Some("i"),
        FORMATTING_PARAMETER => Some("parmname"),
        FORMATTING_SUBSCRIPT => Some("sub"),
        FORMATTING_SUPERSCRIPT => Some("sup"),
        FORMATTING_TELETYPE => Some("tt"),
        FORMATTING_UICONTROL => Some("uicontrol"),
        FORMATTING_UNDERLINE => Some("u"),
        _ => None,
    }
}

fn code_block(out: &mut String, code: &str, class: Option<&str>) {
    match class {
        Some(class) => out.push_str(&format!("<codeblock outputclass=\"{class}\">")),
        None => out.push_str("<codeblock>"),
    }
    out.push_str(&xml_escape(code));
    out.push_str("</codeblock>\n");
}

fn image(out: &mut String, href: &str, alt: &str, inline: bool) {
    let placement = if inline { "inline" } else { "break" };
    out.push_str(&format!(
        "<image href=\"{}\" placement=\"{placement}\">",
        xml_escape(href)
    ));
    if !alt.is_empty() {
        out.push_str(&format!("<alt>{}</alt>", xml_escape(alt)));
    }
    out.push_str("</image>");
}

impl Backend for DitaXmlBackend {
    fn format(&self) -> &str {
        "DITAXML"
    }

    fn description(&self) -> &str {
        "DITA-flavored XML topic fragments"
    }

    fn render_atom(
        &mut self,
        atoms: &[Atom],
        index: usize,
        marker: &dyn CodeMarker,
        out: &mut String,
    ) -> usize {
        let atom = &atoms[index];
        let mut skip_ahead = 0;
        match atom.atype() {
            AtomType::Nop => {}
            AtomType::String => out.push_str(&xml_escape(atom.string())),
            AtomType::RawString => out.push_str(atom.string()),
            AtomType::AutoLink => {
                out.push_str(&format!(
                    "<xref keyref=\"{0}\">{0}</xref>",
                    xml_escape(atom.string())
                ));
            }
            AtomType::C => {
                out.push_str("<codeph>");
                out.push_str(&xml_escape(atom.string()));
                out.push_str("</codeph>");
            }
            AtomType::Code => code_block(out, &marker.marked_up_code(atom.string()), None),
            AtomType::CodeBad => code_block(out, atom.string(), Some("bad")),
            AtomType::CodeOld => code_block(out, atom.string(), Some("old")),
            AtomType::CodeNew => code_block(out, &marker.marked_up_code(atom.string()), Some("new")),
            AtomType::ParaLeft => out.push_str("<p>"),
            AtomType::ParaRight => out.push_str("</p>\n"),
            AtomType::BriefLeft => out.push_str("<shortdesc>"),
            AtomType::BriefRight => out.push_str("</shortdesc>\n"),
            AtomType::AbstractLeft => out.push_str("<abstract>"),
            AtomType::AbstractRight => out.push_str("</abstract>\n"),
            AtomType::NoteLeft => out.push_str("<note>"),
            AtomType::NoteRight => out.push_str("</note>\n"),
            AtomType::ImportantLeft => out.push_str("<note type=\"important\">"),
            AtomType::ImportantRight => out.push_str("</note>\n"),
            AtomType::LegaleseLeft => out.push_str("<section outputclass=\"legalese\">"),
            AtomType::LegaleseRight => out.push_str("</section>\n"),
            AtomType::QuotationLeft => out.push_str("<lq>"),
            AtomType::QuotationRight => out.push_str("</lq>\n"),
            AtomType::SidebarLeft => out.push_str("<sectiondiv outputclass=\"sidebar\">"),
            AtomType::SidebarRight => out.push_str("</sectiondiv>\n"),
            AtomType::FootnoteLeft => out.push_str("<fn>"),
            AtomType::FootnoteRight => out.push_str("</fn>"),
            AtomType::DivLeft => {
                if atom.string().is_empty() {
                    out.push_str("<div>");
                } else {
                    out.push_str(&format!(
                        "<div outputclass=\"{}\">",
                        xml_escape(atom.string())
                    ));
                }
            }
            AtomType::DivRight => out.push_str("</div>\n"),
            AtomType::CaptionLeft => out.push_str("<p outputclass=\"caption\">"),
            AtomType::CaptionRight => out.push_str("</p>\n"),
            AtomType::FormattingLeft => {
                let name = atom.string();
                if name == FORMATTING_LINK {
                    let href = self.pending_link.take().unwrap_or_default();
                    out.push_str(&format!("<xref href=\"{}\">", xml_escape(&href)));
                } else if let Some(tag) = formatting_tag(name) {
                    out.push_str(&format!("<{tag}>"));
                } else if let Some(attr) = name.strip_prefix(FORMATTING_SPAN) {
                    out.push_str(&format!("<ph outputclass=\"{}\">", xml_escape(attr)));
                } else {
                    out.push_str("<ph>");
                }
            }
            AtomType::FormattingRight => {
                let name = atom.string();
                if name == FORMATTING_LINK {
                    out.push_str("</xref>");
                } else if let Some(tag) = formatting_tag(name) {
                    out.push_str(&format!("</{tag}>"));
                } else {
                    out.push_str("</ph>");
                }
            }
            AtomType::Link => self.pending_link = Some(atom.string().to_string()),
            AtomType::ListLeft => out.push_str(&format!("<{}>\n", list_tag(atom.string()))),
            AtomType::ListRight => out.push_str(&format!("</{}>\n", list_tag(atom.string()))),
            // numbering is implicit in <ol>
            AtomType::ListItemNumber => {}
            AtomType::ListItemLeft => {
                out.push_str(&format!("<{}>", list_item_tag(atom.string())));
            }
            AtomType::ListItemRight => {
                out.push_str(&format!("</{}>\n", list_item_tag(atom.string())));
            }
            AtomType::ListTagLeft => out.push_str("<dt>"),
            AtomType::ListTagRight => out.push_str("</dt>\n"),
            AtomType::TableLeft => out.push_str("<table>\n"),
            AtomType::TableRight => out.push_str("</table>\n"),
            AtomType::TableHeaderLeft => out.push_str("<thead><tr>"),
            AtomType::TableHeaderRight => out.push_str("</tr></thead>\n"),
            AtomType::TableRowLeft => out.push_str("<tr>"),
            AtomType::TableRowRight => out.push_str("</tr>\n"),
            AtomType::TableItemLeft => {
                // p1 is "columns,rows"
                let mut spans = atom.string().split(',');
                let cols = spans.next().unwrap_or("1").trim();
                let rows = spans.next().unwrap_or("1").trim();
                out.push_str("<td");
                if !cols.is_empty() && cols != "1" {
                    out.push_str(&format!(" colspan=\"{}\"", xml_escape(cols)));
                }
                if !rows.is_empty() && rows != "1" {
                    out.push_str(&format!(" rowspan=\"{}\"", xml_escape(rows)));
                }
                out.push('>');
            }
            AtomType::TableItemRight => out.push_str("</td>"),
            AtomType::SectionLeft => out.push_str("<section>\n"),
            AtomType::SectionRight => out.push_str("</section>\n"),
            AtomType::SectionHeadingLeft => out.push_str("<title>"),
            AtomType::SectionHeadingRight => out.push_str("</title>\n"),
            AtomType::Target | AtomType::Keyword => {
                out.push_str(&format!("<ph id=\"{}\"/>", xml_escape(atom.string())));
            }
            AtomType::Image | AtomType::InlineImage => {
                let mut alt = "";
                if let Some(next) = atoms.get(index + 1) {
                    if next.atype() == AtomType::ImageText {
                        alt = next.string();
                        skip_ahead = 1;
                    }
                }
                image(out, atom.string(), alt, atom.atype() == AtomType::InlineImage);
            }
            // an ImageText not consumed by a preceding image is stray
            AtomType::ImageText => {}
            AtomType::Br => out.push_str("<br/>\n"),
            AtomType::Hr => out.push_str("<hr/>\n"),
            AtomType::UnhandledFormat => {
                out.push_str(&format!("<b>&lt;Missing {}&gt;</b>", xml_escape(atom.string())));
            }
            AtomType::UnknownCommand => {
                out.push_str(&format!(
                    "<codeph outputclass=\"unknown\">\\{}</codeph>",
                    xml_escape(atom.string())
                ));
            }
            // resolved against the documentation set by the shell above this
            // crate; emitted as processing instructions so a post-pass can
            // find them
            AtomType::TableOfContents => {
                out.push_str(&format!("<?marq toc {}?>\n", xml_escape(atom.string())));
            }
            AtomType::GeneratedList => {
                out.push_str(&format!("<?marq list {}?>\n", xml_escape(atom.string())));
            }
            AtomType::AnnotatedList => {
                out.push_str(&format!(
                    "<?marq annotatedlist {}?>\n",
                    xml_escape(atom.string())
                ));
            }
            AtomType::SinceList => {
                out.push_str(&format!("<?marq sincelist {}?>\n", xml_escape(atom.string())));
            }
            AtomType::FormatIf | AtomType::FormatElse | AtomType::FormatEndif => {}
        }
        skip_ahead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use marq_parser::{MarkerRegistry, Position, Text};

    fn render(text: &Text) -> String {
        let markers = MarkerRegistry::with_defaults();
        let mut backend = DitaXmlBackend::new();
        Interpreter::new()
            .render(
                text,
                &mut backend,
                markers.marker_for_language(""),
                &Position::none(),
            )
            .output
    }

    #[test]
    fn paragraph_text_is_escaped() {
        let mut text = Text::new();
        text.append(Atom::new(AtomType::ParaLeft));
        text.append(Atom::with_string(AtomType::String, "a < b & c"));
        text.append(Atom::new(AtomType::ParaRight));
        assert_eq!(render(&text), "<p>a &lt; b &amp; c</p>\n");
    }

    #[test]
    fn link_span_uses_the_pending_target() {
        let mut text = Text::new();
        text.append(Atom::with_string(AtomType::Link, "widgets.html"));
        text.append(Atom::with_string(AtomType::FormattingLeft, FORMATTING_LINK));
        text.append(Atom::with_string(AtomType::String, "Widgets"));
        text.append(Atom::with_string(AtomType::FormattingRight, FORMATTING_LINK));
        assert_eq!(
            render(&text),
            "<xref href=\"widgets.html\">Widgets</xref>"
        );
    }

    #[test]
    fn image_consumes_its_caption_atom() {
        let mut text = Text::new();
        text.append(Atom::with_string(AtomType::Image, "pic.png"));
        text.append(Atom::with_string(AtomType::ImageText, "a picture"));
        assert_eq!(
            render(&text),
            "<image href=\"pic.png\" placement=\"break\"><alt>a picture</alt></image>"
        );
    }

    #[test]
    fn value_list_renders_as_definition_list() {
        let mut text = Text::new();
        text.append(Atom::with_string(AtomType::ListLeft, "value"));
        text.append(Atom::with_string(AtomType::ListTagLeft, "value"));
        text.append(Atom::with_string(AtomType::String, "Qt::Red"));
        text.append(Atom::with_string(AtomType::ListTagRight, "value"));
        text.append(Atom::with_string(AtomType::ListItemLeft, "value"));
        text.append(Atom::with_string(AtomType::String, "red"));
        text.append(Atom::with_string(AtomType::ListItemRight, "value"));
        text.append(Atom::with_string(AtomType::ListRight, "value"));
        assert_eq!(
            render(&text),
            "<dl>\n<dt>Qt::Red</dt>\n<dd>red</dd>\n</dl>\n"
        );
    }

    #[test]
    fn numeric_list_uses_ol() {
        let mut text = Text::new();
        text.append(Atom::with_string(AtomType::ListLeft, "numeric"));
        text.append(Atom::with_string(AtomType::ListItemNumber, "1"));
        text.append(Atom::with_string(AtomType::ListItemLeft, "numeric"));
        text.append(Atom::with_string(AtomType::String, "first"));
        text.append(Atom::with_string(AtomType::ListItemRight, "numeric"));
        text.append(Atom::with_string(AtomType::ListRight, "numeric"));
        assert_eq!(render(&text), "<ol>\n<li>first</li>\n</ol>\n");
    }

    #[test]
    fn raw_string_is_not_escaped() {
        let mut text = Text::new();
        text.append(Atom::with_string(AtomType::RawString, "<b>raw</b>"));
        assert_eq!(render(&text), "<b>raw</b>");
    }

    #[test]
    fn table_item_spans_become_attributes() {
        let mut text = Text::new();
        text.append(Atom::with_strings(AtomType::TableItemLeft, "2,1", ""));
        text.append(Atom::new(AtomType::TableItemRight));
        assert_eq!(render(&text), "<td colspan=\"2\"></td>");
    }
}
