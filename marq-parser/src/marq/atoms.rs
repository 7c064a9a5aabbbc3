//! The Atom/Text model the parser produces.
//!
//! A parsed comment is a flat, append-only sequence of typed atoms held in a
//! `Vec` arena (no linked pointers; a "next atom" is just the next index).
//! During construction the parser may merge into, chop, or strip the last
//! atom; once parsing finishes the sequence is read-only, and derived views
//! such as the brief sentence are index-range slices into the same storage.

use serde::{Deserialize, Serialize};

/// The type tag of one atom. `String` payloads carry the text, `*Left` /
/// `*Right` pairs delimit spans, and `FormatIf`/`FormatElse`/`FormatEndif`
/// defer format-specific alternatives to generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomType {
    Nop,
    AbstractLeft,
    AbstractRight,
    AnnotatedList,
    AutoLink,
    Br,
    BriefLeft,
    BriefRight,
    C,
    CaptionLeft,
    CaptionRight,
    Code,
    CodeBad,
    CodeNew,
    CodeOld,
    DivLeft,
    DivRight,
    FootnoteLeft,
    FootnoteRight,
    FormatElse,
    FormatEndif,
    FormatIf,
    FormattingLeft,
    FormattingRight,
    GeneratedList,
    Hr,
    Image,
    ImageText,
    ImportantLeft,
    ImportantRight,
    InlineImage,
    Keyword,
    LegaleseLeft,
    LegaleseRight,
    Link,
    ListLeft,
    ListItemNumber,
    ListTagLeft,
    ListTagRight,
    ListItemLeft,
    ListItemRight,
    ListRight,
    NoteLeft,
    NoteRight,
    ParaLeft,
    ParaRight,
    QuotationLeft,
    QuotationRight,
    RawString,
    SectionLeft,
    SectionRight,
    SectionHeadingLeft,
    SectionHeadingRight,
    SidebarLeft,
    SidebarRight,
    SinceList,
    String,
    Target,
    TableLeft,
    TableRight,
    TableHeaderLeft,
    TableHeaderRight,
    TableRowLeft,
    TableRowRight,
    TableItemLeft,
    TableItemRight,
    TableOfContents,
    UnhandledFormat,
    UnknownCommand,
}

// Payload names for FormattingLeft/FormattingRight atoms.
pub const FORMATTING_BOLD: &str = "bold";
pub const FORMATTING_INDEX: &str = "index";
pub const FORMATTING_ITALIC: &str = "italic";
pub const FORMATTING_LINK: &str = "link";
pub const FORMATTING_PARAMETER: &str = "parameter";
pub const FORMATTING_SPAN: &str = "span ";
pub const FORMATTING_SUBSCRIPT: &str = "subscript";
pub const FORMATTING_SUPERSCRIPT: &str = "superscript";
pub const FORMATTING_TELETYPE: &str = "teletype";
pub const FORMATTING_UICONTROL: &str = "uicontrol";
pub const FORMATTING_UNDERLINE: &str = "underline";

/// One typed node with up to two string payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    atype: AtomType,
    p1: String,
    p2: String,
}

impl Atom {
    pub fn new(atype: AtomType) -> Atom {
        Atom {
            atype,
            p1: String::new(),
            p2: String::new(),
        }
    }

    pub fn with_string(atype: AtomType, p1: impl Into<String>) -> Atom {
        Atom {
            atype,
            p1: p1.into(),
            p2: String::new(),
        }
    }

    pub fn with_strings(
        atype: AtomType,
        p1: impl Into<String>,
        p2: impl Into<String>,
    ) -> Atom {
        Atom {
            atype,
            p1: p1.into(),
            p2: p2.into(),
        }
    }

    pub fn atype(&self) -> AtomType {
        self.atype
    }

    pub fn string(&self) -> &str {
        &self.p1
    }

    pub fn string2(&self) -> &str {
        &self.p2
    }

    pub fn set_string(&mut self, s: impl Into<String>) {
        self.p1 = s.into();
    }

    pub fn append_string(&mut self, s: &str) {
        self.p1.push_str(s);
    }

    pub fn append_char(&mut self, ch: char) {
        self.p1.push(ch);
    }

    /// Removes the last character of the payload, if any.
    pub fn chop_string(&mut self) {
        self.p1.pop();
    }
}

/// An owned sequence of atoms.
///
/// The parser keeps a synthetic leading `Nop` while building so that "the
/// last atom" always exists; `strip_first_atom` removes it when parsing
/// completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    atoms: Vec<Atom>,
}

impl Text {
    pub fn new() -> Text {
        Text { atoms: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn first_atom(&self) -> Option<&Atom> {
        self.atoms.first()
    }

    pub fn last_atom(&self) -> Option<&Atom> {
        self.atoms.last()
    }

    pub fn last_atom_mut(&mut self) -> Option<&mut Atom> {
        self.atoms.last_mut()
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    /// Index of the last atom, used by the parser to record positions for
    /// the table of contents and target lists.
    pub fn last_index(&self) -> usize {
        self.atoms.len().saturating_sub(1)
    }

    pub fn append(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    /// Appends a character to the trailing `String` atom, starting one if
    /// needed. Runs of spaces collapse to a single space.
    pub fn append_char(&mut self, ch: char) {
        if self.last_atom().map(Atom::atype) != Some(AtomType::String) {
            self.append(Atom::new(AtomType::String));
        }
        if let Some(atom) = self.atoms.last_mut() {
            if ch == ' ' {
                if !atom.string().ends_with(' ') {
                    atom.append_char(' ');
                }
            } else {
                atom.append_char(ch);
            }
        }
    }

    /// Appends a word, merging into the trailing `String` atom when there is
    /// one.
    pub fn append_word(&mut self, word: &str) {
        match self.atoms.last_mut() {
            Some(atom) if atom.atype() == AtomType::String => atom.append_string(word),
            _ => self.append(Atom::with_string(AtomType::String, word)),
        }
    }

    pub fn strip_first_atom(&mut self) {
        if !self.atoms.is_empty() {
            self.atoms.remove(0);
        }
    }

    pub fn strip_last_atom(&mut self) {
        self.atoms.pop();
    }

    /// The sub-range delimited by the first `left`/`right` tag pair, as a
    /// borrowed view into the same storage. With `inclusive` the delimiters
    /// are part of the view.
    pub fn sub_text(&self, left: AtomType, right: AtomType, inclusive: bool) -> Option<&[Atom]> {
        let start = self.atoms.iter().position(|a| a.atype() == left)?;
        let end = start
            + self.atoms[start..]
                .iter()
                .position(|a| a.atype() == right)?;
        if inclusive {
            Some(&self.atoms[start..=end])
        } else {
            Some(&self.atoms[start + 1..end])
        }
    }

    /// Concatenation of the plain-text payloads (`String` and `AutoLink`).
    pub fn to_plain_string(&self) -> String {
        plain_string(&self.atoms)
    }
}

impl From<Vec<Atom>> for Text {
    fn from(atoms: Vec<Atom>) -> Text {
        Text { atoms }
    }
}

/// Plain-text payload concatenation over any atom slice, so it also works on
/// `sub_text` views.
pub fn plain_string(atoms: &[Atom]) -> String {
    let mut out = String::new();
    for atom in atoms {
        match atom.atype() {
            AtomType::String | AtomType::AutoLink | AtomType::C => out.push_str(atom.string()),
            _ => {}
        }
    }
    out
}
