//! The doc parser: raw comment text in, atom sequence out.
//!
//! This is a hand-rolled character scanner. A backslash introduces a command
//! word; everything else is literal text, classified word-by-word so that
//! code-like symbols auto-link. Commands dispatch through one closed match
//! over [`Cmd`]; all nesting legality (lists, tables, sections, formatting
//! spans, preprocessor conditionals) lives in the per-call parser state.
//!
//! Macro bodies and `\include`d files are spliced into the input stream in
//! place. The splice stack records where each spliced region ends so that
//! source locations unwind correctly, and locations are computed lazily by
//! replaying consumed characters only when a diagnostic fires.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::marq::atoms::{
    plain_string, Atom, AtomType, Text, FORMATTING_BOLD, FORMATTING_INDEX, FORMATTING_ITALIC,
    FORMATTING_LINK, FORMATTING_PARAMETER, FORMATTING_SPAN, FORMATTING_SUBSCRIPT,
    FORMATTING_SUPERSCRIPT, FORMATTING_TELETYPE, FORMATTING_UICONTROL, FORMATTING_UNDERLINE,
};
use crate::marq::commands::{Cmd, CommandTable};
use crate::marq::diagnostics::Diagnostics;
use crate::marq::edit_distance::nearest_name;
use crate::marq::lists::{ListStyle, OpenedList};
use crate::marq::location::{Location, Position};
use crate::marq::macros::{self, Macro, MacroSegment, MacroTable};
use crate::marq::markers::{CodeMarker, MarkerRegistry};

/// Section nesting levels. Parts and chapters sit above `\section1`.
pub const SECTION_NONE: i32 = -2;
pub const SECTION_PART: i32 = -1;
pub const SECTION_CHAPTER: i32 = 0;

/// Knobs the parser reads from configuration.
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub tab_size: usize,
    pub include_paths: Vec<PathBuf>,
    pub max_include_depth: usize,
    /// The output-format token `\if` conditions are evaluated against.
    pub output_format: String,
    /// Extra tokens that count as true in `\if` conditions.
    pub defines: BTreeSet<String>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            tab_size: 8,
            include_paths: Vec::new(),
            max_include_depth: 16,
            output_format: "HTML".to_string(),
            defines: BTreeSet::new(),
        }
    }
}

/// Errors that abort parsing of the current comment. Everything else is a
/// diagnostic; the batch caller moves on to the next comment either way.
#[derive(Debug)]
pub enum ParseError {
    TooManyNestedIncludes { position: Position },
    IncludeNotFound { file: String, position: Position },
    IncludeUnreadable { file: String, position: Position, reason: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TooManyNestedIncludes { position } => {
                write!(f, "{}: too many nested '\\include's", position)
            }
            ParseError::IncludeNotFound { file, position } => {
                write!(f, "{}: cannot find include file '{}'", position, file)
            }
            ParseError::IncludeUnreadable {
                file,
                position,
                reason,
            } => write!(f, "{}: cannot read include file '{}': {}", position, file, reason),
        }
    }
}

impl std::error::Error for ParseError {}

/// A metacommand argument with the position it was read at, kept raw for
/// later validation against real signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgLoc {
    pub arg: String,
    pub position: Position,
}

/// One topic command occurrence (a comment may document several topics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic: String,
    pub args: String,
}

/// A heading recorded for the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Index of the `SectionLeft` atom in the body.
    pub atom_index: usize,
    pub level: i32,
}

/// A named `\target` or `\keyword`, pointing at its atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    pub name: String,
    pub atom_index: usize,
}

/// Everything one parse call produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDoc {
    pub body: Text,
    pub params: BTreeSet<String>,
    pub also_list: Vec<Text>,
    pub enum_item_list: Vec<String>,
    pub omit_enum_item_list: Vec<String>,
    pub metacommands_used: BTreeSet<String>,
    pub metacommand_map: BTreeMap<String, Vec<ArgLoc>>,
    pub topics: Vec<Topic>,
    pub targets: Vec<TargetRef>,
    pub keywords: Vec<TargetRef>,
    pub table_of_contents: Vec<TocEntry>,
    pub meta_map: BTreeMap<String, Vec<String>>,
    pub has_legalese: bool,
    pub diagnostics: Diagnostics,
}

impl ParsedDoc {
    /// The brief sentence, as a view into the body.
    pub fn brief(&self) -> Option<&[Atom]> {
        self.body
            .sub_text(AtomType::BriefLeft, AtomType::BriefRight, false)
    }

    pub fn legalese(&self) -> Option<&[Atom]> {
        if !self.has_legalese {
            return None;
        }
        self.body
            .sub_text(AtomType::LegaleseLeft, AtomType::LegaleseRight, false)
    }

    /// Serializes the whole parse result as pretty JSON, for snapshotting
    /// and external tooling.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// The process-wide half of the compiler: command table, macro table, marker
/// registry and settings, built once from configuration and shared read-only
/// across parse calls.
pub struct DocCompiler {
    commands: CommandTable,
    macros: MacroTable,
    markers: MarkerRegistry,
    settings: ParserSettings,
}

impl DocCompiler {
    pub fn new(
        commands: CommandTable,
        macros: MacroTable,
        markers: MarkerRegistry,
        settings: ParserSettings,
    ) -> DocCompiler {
        DocCompiler {
            commands,
            macros,
            markers,
            settings,
        }
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Parses one comment. `meta_commands` and `topic_commands` come from
    /// the symbol-database collaborator: backslash words in neither the
    /// command table nor these sets nor the macro table are unknown.
    pub fn parse(
        &self,
        start: Location,
        source: &str,
        meta_commands: &BTreeSet<String>,
        topic_commands: &BTreeSet<String>,
    ) -> Result<ParsedDoc, ParseError> {
        let mut parser = DocParser::new(self, start, source, meta_commands, topic_commands);
        parser.run()?;
        Ok(parser.finish())
    }

    /// Convenience for sources with no file, metacommands or topics.
    pub fn parse_str(&self, source: &str) -> Result<ParsedDoc, ParseError> {
        self.parse(
            Location::default(),
            source,
            &BTreeSet::new(),
            &BTreeSet::new(),
        )
    }
}

impl Default for DocCompiler {
    fn default() -> Self {
        DocCompiler::new(
            CommandTable::builtin(),
            MacroTable::new(),
            MarkerRegistry::with_defaults(),
            ParserSettings::default(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParagraphState {
    Outside,
    InSingleLine,
    InMultiLine,
}

struct DocParser<'a> {
    compiler: &'a DocCompiler,
    meta_commands: &'a BTreeSet<String>,
    topic_commands: &'a BTreeSet<String>,

    input: Vec<char>,
    pos: usize,

    cached_loc: Location,
    cached_pos: usize,
    // end positions of active input splices, innermost last
    opened_inputs: Vec<usize>,

    doc: ParsedDoc,

    para_state: ParagraphState,
    pending_para_left: AtomType,
    pending_para_right: AtomType,
    pending_para_string: String,
    in_table_header: bool,
    in_table_row: bool,
    in_table_item: bool,
    index_started_para: bool,

    brace_depth: i32,
    min_indent: usize,
    open_sections: Vec<i32>,
    pending_formats: BTreeMap<i32, String>,
    opened_commands: Vec<Cmd>,
    opened_lists: Vec<OpenedList>,
    preprocessor_skipping: Vec<bool>,
    num_preprocessor_skipping: i32,
    target_map: HashMap<String, Position>,
    current_link_atom: Option<usize>,
    code_marker: Option<&'a dyn CodeMarker>,

    preproc_re: Option<Regex>,
}

impl<'a> DocParser<'a> {
    fn new(
        compiler: &'a DocCompiler,
        start: Location,
        source: &str,
        meta_commands: &'a BTreeSet<String>,
        topic_commands: &'a BTreeSet<String>,
    ) -> DocParser<'a> {
        let table = compiler.commands();
        let preproc_re = Regex::new(&format!(
            r"\\(?:{}|{}|{})\b",
            regex::escape(table.name_of(Cmd::If)),
            regex::escape(table.name_of(Cmd::Else)),
            regex::escape(table.name_of(Cmd::EndIf)),
        ))
        .ok();

        let mut doc = ParsedDoc::default();
        // synthetic leading atom so "the last atom" always exists
        doc.body.append(Atom::new(AtomType::Nop));

        DocParser {
            compiler,
            meta_commands,
            topic_commands,
            input: source.chars().collect(),
            pos: 0,
            cached_loc: start,
            cached_pos: 0,
            opened_inputs: Vec::new(),
            doc,
            para_state: ParagraphState::Outside,
            pending_para_left: AtomType::Nop,
            pending_para_right: AtomType::Nop,
            pending_para_string: String::new(),
            in_table_header: false,
            in_table_row: false,
            in_table_item: false,
            index_started_para: false,
            brace_depth: 0,
            min_indent: usize::MAX,
            open_sections: Vec::new(),
            pending_formats: BTreeMap::new(),
            opened_commands: vec![Cmd::Omit],
            opened_lists: Vec::new(),
            preprocessor_skipping: Vec::new(),
            num_preprocessor_skipping: 0,
            target_map: HashMap::new(),
            current_link_atom: None,
            code_marker: None,
            preproc_re,
        }
    }

    // ----- location bookkeeping ------------------------------------------

    /// Replays consumed characters since the last cached position and
    /// returns where the parser currently is. Splice frames whose region is
    /// fully consumed are popped first.
    fn location(&mut self) -> Position {
        while let Some(&end) = self.opened_inputs.last() {
            if end <= self.pos {
                self.cached_loc.pop();
                self.opened_inputs.pop();
                self.cached_pos = end;
            } else {
                break;
            }
        }
        while self.cached_pos < self.pos {
            self.cached_loc.advance(self.input[self.cached_pos]);
            self.cached_pos += 1;
        }
        self.cached_loc.position()
    }

    fn warn(&mut self, message: impl Into<String>) {
        let pos = self.location();
        self.doc.diagnostics.warning(pos, message);
    }

    fn warn_with_note(&mut self, message: impl Into<String>, note: impl Into<String>) {
        let pos = self.location();
        self.doc.diagnostics.warning_with_note(pos, message, note);
    }

    /// Inserts `text` into the input stream at the current position,
    /// attributing it to `file` until the region is consumed.
    fn splice_input(&mut self, text: &str, file: &str) {
        // sync before pushing so outer characters are not charged to the
        // spliced frame
        self.location();
        self.cached_loc.push(file);
        let spliced: Vec<char> = text.chars().collect();
        let n = spliced.len();
        self.input.splice(self.pos..self.pos, spliced);
        self.opened_inputs.push(self.pos + n);
    }

    // ----- names ----------------------------------------------------------

    fn cmd_name(&self, cmd: Cmd) -> String {
        format!("\\{}", self.compiler.commands().name_of(cmd))
    }

    fn end_cmd_name(&self, cmd: Cmd) -> String {
        self.cmd_name(cmd.end_cmd())
    }

    // ----- main loop ------------------------------------------------------

    fn run(&mut self) -> Result<(), ParseError> {
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            match ch {
                '\\' => self.handle_backslash()?,
                '{' => {
                    self.enter_para();
                    self.append_char('{');
                    self.brace_depth += 1;
                    self.pos += 1;
                }
                '}' => self.handle_close_brace(),
                _ => self.handle_text_char(ch),
            }
        }

        self.leave_value_list();

        // legalese may be left open; close it silently for compatibility
        if self.opened_commands.last() == Some(&Cmd::Legalese) {
            self.append(Atom::new(AtomType::LegaleseRight));
            self.opened_commands.pop();
        }

        // auto-close the rest, appending the closing atoms an explicit end
        // command would have appended so the body stays paired
        while let Some(&top) = self.opened_commands.last() {
            if top == Cmd::Omit {
                break;
            }
            self.warn(format!("missing '{}'", self.end_cmd_name(top)));
            match top {
                Cmd::List => {
                    self.leave_para();
                    if let Some(list) = self.opened_lists.last() {
                        if list.is_started() {
                            let style = list.style_string();
                            self.append(Atom::with_string(AtomType::ListItemRight, style));
                            self.append(Atom::with_string(AtomType::ListRight, style));
                        }
                    }
                    self.opened_lists.pop();
                }
                Cmd::Abstract => {
                    self.leave_para();
                    self.append(Atom::new(AtomType::AbstractRight));
                }
                Cmd::Quotation => {
                    self.leave_para();
                    self.append(Atom::new(AtomType::QuotationRight));
                }
                Cmd::Sidebar => {
                    self.leave_para();
                    self.append(Atom::new(AtomType::SidebarRight));
                }
                Cmd::Footnote => {
                    self.leave_para();
                    self.append(Atom::new(AtomType::FootnoteRight));
                }
                Cmd::Div => {
                    self.leave_para();
                    self.append(Atom::new(AtomType::DivRight));
                }
                Cmd::Table => {
                    self.leave_table_row();
                    self.append(Atom::new(AtomType::TableRight));
                }
                Cmd::Link => {
                    self.append(Atom::with_string(
                        AtomType::FormattingRight,
                        FORMATTING_LINK,
                    ));
                }
                _ => {}
            }
            self.opened_commands.pop();
        }

        if !self.preprocessor_skipping.is_empty() {
            self.warn(format!("missing '{}'", self.cmd_name(Cmd::EndIf)));
        }

        self.leave_para();
        while let Some(level) = self.open_sections.pop() {
            self.append(Atom::with_string(AtomType::SectionRight, level.to_string()));
        }

        // the synthetic leading atom occupied index 0, so every index
        // recorded during the parse shifts down with it
        self.doc.body.strip_first_atom();
        for entry in &mut self.doc.table_of_contents {
            entry.atom_index = entry.atom_index.saturating_sub(1);
        }
        for target in &mut self.doc.targets {
            target.atom_index = target.atom_index.saturating_sub(1);
        }
        for keyword in &mut self.doc.keywords {
            keyword.atom_index = keyword.atom_index.saturating_sub(1);
        }
        Ok(())
    }

    fn finish(self) -> ParsedDoc {
        self.doc
    }

    // ----- backslash dispatch --------------------------------------------

    fn handle_backslash(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        let mut cmd_str = String::new();
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            if ch.is_alphanumeric() {
                cmd_str.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }

        if cmd_str.is_empty() {
            // escaped punctuation: "\{" is a literal brace
            if self.pos < self.input.len() {
                self.enter_para();
                let ch = self.input[self.pos];
                if ch.is_whitespace() {
                    self.skip_all_spaces();
                    self.append_char(' ');
                } else {
                    self.append_char(ch);
                    self.pos += 1;
                }
            }
            return Ok(());
        }

        match self.compiler.commands().lookup(&cmd_str) {
            Some(cmd) => self.dispatch(cmd, &cmd_str),
            None => {
                self.not_a_command(&cmd_str);
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, cmd: Cmd, cmd_str: &str) -> Result<(), ParseError> {
        match cmd {
            Cmd::A => {
                self.enter_para();
                let p1 = self.get_argument(false);
                self.append(Atom::with_string(
                    AtomType::FormattingLeft,
                    FORMATTING_PARAMETER,
                ));
                self.append(Atom::with_string(AtomType::String, p1.clone()));
                self.append(Atom::with_string(
                    AtomType::FormattingRight,
                    FORMATTING_PARAMETER,
                ));
                self.doc.params.insert(p1);
            }
            Cmd::Abstract => {
                if self.open_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::AbstractLeft));
                }
            }
            Cmd::AnnotatedList => {
                let arg = self.get_argument(false);
                self.append(Atom::with_string(AtomType::AnnotatedList, arg));
            }
            Cmd::B | Cmd::Bold => {
                if cmd == Cmd::Bold {
                    self.warn("'\\bold' is deprecated, use '\\b'");
                }
                self.start_format(FORMATTING_BOLD.to_string(), cmd);
            }
            Cmd::BadCode => {
                self.leave_para();
                let code = self.get_code(cmd, self.code_marker);
                self.append(Atom::with_string(AtomType::CodeBad, code));
            }
            Cmd::Br => {
                self.leave_para();
                self.append(Atom::new(AtomType::Br));
            }
            Cmd::Brief => {
                self.leave_para();
                self.enter_para_with(AtomType::BriefLeft, AtomType::BriefRight, String::new());
            }
            Cmd::C => {
                self.enter_para();
                let raw = self.get_argument_impl(true);
                let arg = self.untabify(&raw);
                let marker = self.compiler.markers().marker_for_code(&arg);
                self.code_marker = Some(marker);
                let marked = marker.marked_up_code(&arg);
                self.append(Atom::with_string(AtomType::C, marked));
            }
            Cmd::Caption => {
                self.leave_para();
                self.enter_para_with(
                    AtomType::CaptionLeft,
                    AtomType::CaptionRight,
                    String::new(),
                );
            }
            Cmd::Chapter => self.start_section(SECTION_CHAPTER),
            Cmd::Code => {
                self.leave_para();
                let code = self.get_code(cmd, None);
                self.append(Atom::with_string(AtomType::Code, code));
            }
            Cmd::CodeLine => {
                self.chop_trailing_code_newline();
                self.append_to_code("\n");
            }
            Cmd::Div => {
                self.leave_para();
                let p1 = self.get_argument(true);
                self.append(Atom::with_string(AtomType::DivLeft, p1));
                self.opened_commands.push(cmd);
            }
            Cmd::Dots => {
                self.chop_trailing_code_newline();
                let arg = self.get_optional_argument();
                let indent: usize = arg.parse().unwrap_or(4);
                let mut line = " ".repeat(indent);
                line.push_str("...\n");
                self.append_to_code(&line);
            }
            Cmd::E | Cmd::I => {
                if cmd == Cmd::I {
                    self.warn("'\\i' is deprecated, use '\\e' for italic or '\\li' for list item");
                }
                self.start_format(FORMATTING_ITALIC.to_string(), cmd);
            }
            Cmd::Else => self.preprocessor_else(),
            Cmd::EndAbstract => {
                if self.close_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::AbstractRight));
                }
            }
            Cmd::EndChapter => self.end_section(SECTION_CHAPTER, cmd),
            Cmd::EndCode | Cmd::EndOmit => {
                self.close_command(cmd);
            }
            Cmd::EndDiv => {
                self.leave_para();
                self.append(Atom::new(AtomType::DivRight));
                self.close_command(cmd);
            }
            Cmd::EndFootnote => {
                if self.close_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::FootnoteRight));
                    self.para_state = ParagraphState::InMultiLine;
                }
            }
            Cmd::EndIf => self.preprocessor_endif(),
            Cmd::EndLegalese => {
                if self.close_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::LegaleseRight));
                }
            }
            Cmd::EndLink => {
                if self.close_command(cmd) {
                    if let Some(last) = self.doc.body.last_atom_mut() {
                        if last.atype() == AtomType::String && last.string().ends_with(' ') {
                            last.chop_string();
                        }
                    }
                    self.append(Atom::with_string(
                        AtomType::FormattingRight,
                        FORMATTING_LINK,
                    ));
                }
            }
            Cmd::EndList => {
                if self.close_command(cmd) {
                    self.leave_para();
                    if let Some(list) = self.opened_lists.last() {
                        if list.is_started() {
                            let style = list.style_string();
                            self.append(Atom::with_string(AtomType::ListItemRight, style));
                            self.append(Atom::with_string(AtomType::ListRight, style));
                        }
                    }
                    self.opened_lists.pop();
                }
            }
            Cmd::EndPart => self.end_section(SECTION_PART, cmd),
            Cmd::EndQuotation => {
                if self.close_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::QuotationRight));
                }
            }
            Cmd::EndRaw => {
                self.warn(format!("unexpected '{}'", self.cmd_name(Cmd::EndRaw)));
            }
            Cmd::EndSection1 => self.end_section(1, cmd),
            Cmd::EndSection2 => self.end_section(2, cmd),
            Cmd::EndSection3 => self.end_section(3, cmd),
            Cmd::EndSection4 => self.end_section(4, cmd),
            Cmd::EndSidebar => {
                if self.close_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::SidebarRight));
                }
            }
            Cmd::EndTable => {
                if self.close_command(cmd) {
                    self.leave_table_row();
                    self.append(Atom::new(AtomType::TableRight));
                }
            }
            Cmd::Footnote => {
                if self.open_command(cmd) {
                    self.enter_para();
                    self.append(Atom::new(AtomType::FootnoteLeft));
                    self.para_state = ParagraphState::Outside;
                }
            }
            Cmd::GenerateList => {
                let arg = self.get_argument(false);
                self.append(Atom::with_string(AtomType::GeneratedList, arg));
            }
            Cmd::Header => {
                if self.opened_commands.last() == Some(&Cmd::Table) {
                    self.leave_table_row();
                    self.append(Atom::new(AtomType::TableHeaderLeft));
                    self.in_table_header = true;
                } else {
                    self.misplaced_table_command(cmd);
                }
            }
            Cmd::Hr => {
                self.leave_para();
                self.append(Atom::new(AtomType::Hr));
            }
            Cmd::If => self.preprocessor_if(),
            Cmd::Image => {
                self.leave_value_list();
                let name = self.get_argument(false);
                let caption = self.get_rest_of_line();
                self.append(Atom::with_string(AtomType::Image, name));
                self.append(Atom::with_string(AtomType::ImageText, caption));
            }
            Cmd::Important => {
                self.leave_para();
                self.enter_para_with(
                    AtomType::ImportantLeft,
                    AtomType::ImportantRight,
                    String::new(),
                );
            }
            Cmd::Include | Cmd::Input => {
                let file = self.get_argument(false);
                let identifier = self.get_rest_of_line();
                self.include(&file, &identifier)?;
            }
            Cmd::InlineImage => {
                self.enter_para();
                let name = self.get_argument(false);
                let caption = self.get_rest_of_line();
                self.append(Atom::with_string(AtomType::InlineImage, name));
                self.append(Atom::with_string(AtomType::ImageText, caption));
                self.append(Atom::with_string(AtomType::String, " "));
            }
            Cmd::Index => {
                if self.para_state == ParagraphState::Outside {
                    self.enter_para();
                    self.index_started_para = true;
                } else if self.index_started_para {
                    let still_index = self.doc.body.last_atom().map_or(false, |last| {
                        last.atype() == AtomType::FormattingRight
                            && last.string() == FORMATTING_INDEX
                    });
                    if !still_index {
                        self.index_started_para = false;
                    }
                }
                self.start_format(FORMATTING_INDEX.to_string(), cmd);
            }
            Cmd::Keyword => {
                let name = self.get_rest_of_line();
                self.insert_target(&name, true);
            }
            Cmd::L => self.parse_link_shorthand(cmd),
            Cmd::Legalese => {
                self.leave_para();
                if self.open_command(cmd) {
                    self.append(Atom::new(AtomType::LegaleseLeft));
                }
                self.doc.has_legalese = true;
            }
            Cmd::Li | Cmd::O => {
                if cmd == Cmd::O {
                    self.warn("'\\o' is deprecated, use '\\li'");
                }
                self.parse_list_or_table_item();
            }
            Cmd::Link => {
                if self.open_command(cmd) {
                    self.enter_para();
                    let target = self.get_argument(false);
                    self.append(Atom::with_string(AtomType::Link, target));
                    self.append(Atom::with_string(
                        AtomType::FormattingLeft,
                        FORMATTING_LINK,
                    ));
                    self.skip_spaces_or_one_endl();
                }
            }
            Cmd::List => {
                if self.open_command(cmd) {
                    self.leave_para();
                    let hint = self.get_optional_argument();
                    self.opened_lists.push(OpenedList::from_hint(&hint));
                }
            }
            Cmd::Meta => {
                let name = self.get_argument(false);
                let value = self.get_argument(false);
                self.doc.meta_map.entry(name).or_default().push(value);
            }
            Cmd::NewCode => {
                self.warn(format!("unexpected '{}'", self.cmd_name(Cmd::NewCode)));
            }
            Cmd::Note => {
                self.leave_para();
                self.enter_para_with(AtomType::NoteLeft, AtomType::NoteRight, String::new());
            }
            Cmd::OldCode => {
                self.leave_para();
                let old = self.get_code(Cmd::OldCode, self.code_marker);
                self.append(Atom::with_string(AtomType::CodeOld, old));
                let new = self.get_code(Cmd::NewCode, self.code_marker);
                self.append(Atom::with_string(AtomType::CodeNew, new));
            }
            Cmd::Omit => {
                self.get_until_end(cmd);
            }
            Cmd::OmitValue => {
                let name = self.get_argument(false);
                if !self.doc.enum_item_list.contains(&name) {
                    self.doc.enum_item_list.push(name.clone());
                }
                if !self.doc.omit_enum_item_list.contains(&name) {
                    self.doc.omit_enum_item_list.push(name);
                }
            }
            Cmd::Overload => {
                self.doc.metacommands_used.insert(cmd_str.to_string());
                let mut arg = String::new();
                if !self.is_blank_line() {
                    arg = self.get_rest_of_line();
                }
                if !arg.is_empty() {
                    self.append(Atom::new(AtomType::ParaLeft));
                    self.append(Atom::with_string(
                        AtomType::String,
                        "This function overloads ",
                    ));
                    self.append(Atom::with_string(AtomType::AutoLink, arg.clone()));
                    self.append(Atom::with_string(AtomType::String, "."));
                    self.append(Atom::new(AtomType::ParaRight));
                } else {
                    self.append(Atom::new(AtomType::ParaLeft));
                    self.append(Atom::with_string(
                        AtomType::String,
                        "This is an overloaded function.",
                    ));
                    self.append(Atom::new(AtomType::ParaRight));
                    arg = self.get_meta_command_argument(cmd_str);
                }
                let position = self.location();
                self.doc
                    .metacommand_map
                    .entry(cmd_str.to_string())
                    .or_default()
                    .push(ArgLoc { arg, position });
            }
            Cmd::Part => self.start_section(SECTION_PART),
            Cmd::Quotation => {
                if self.open_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::QuotationLeft));
                }
            }
            Cmd::Raw => {
                self.leave_para();
                let format = self.get_rest_of_line();
                if format.is_empty() {
                    self.warn(format!(
                        "missing format name after '{}'",
                        self.cmd_name(Cmd::Raw)
                    ));
                }
                self.append(Atom::with_string(AtomType::FormatIf, format));
                let body = self.get_until_end(cmd);
                let body = self.untabify(&body);
                self.append(Atom::with_string(AtomType::RawString, body));
                self.append(Atom::new(AtomType::FormatElse));
                self.append(Atom::new(AtomType::FormatEndif));
            }
            Cmd::Row => {
                if self.opened_commands.last() == Some(&Cmd::Table) {
                    let mut attr = String::new();
                    if self.is_left_brace_ahead() {
                        attr = self.get_argument(true);
                    }
                    self.leave_table_row();
                    self.append(Atom::with_string(AtomType::TableRowLeft, attr));
                    self.in_table_row = true;
                } else {
                    self.misplaced_table_command(cmd);
                }
            }
            Cmd::Sa => self.parse_also(),
            Cmd::Section1 => self.start_section(1),
            Cmd::Section2 => self.start_section(2),
            Cmd::Section3 => self.start_section(3),
            Cmd::Section4 => self.start_section(4),
            Cmd::Sidebar => {
                if self.open_command(cmd) {
                    self.leave_para();
                    self.append(Atom::new(AtomType::SidebarLeft));
                }
            }
            Cmd::SinceList => {
                let arg = self.get_rest_of_line();
                self.append(Atom::with_string(AtomType::SinceList, arg));
            }
            Cmd::Span => {
                let arg = self.get_argument(true);
                self.start_format(format!("{}{}", FORMATTING_SPAN, arg), cmd);
            }
            Cmd::Sub => self.start_format(FORMATTING_SUBSCRIPT.to_string(), cmd),
            Cmd::Sup => self.start_format(FORMATTING_SUPERSCRIPT.to_string(), cmd),
            Cmd::Table => {
                let p1 = self.get_optional_argument();
                let p2 = self.get_optional_argument();
                if self.open_command(cmd) {
                    self.leave_para();
                    self.append(Atom::with_strings(AtomType::TableLeft, p1, p2));
                    self.in_table_header = false;
                    self.in_table_row = false;
                    self.in_table_item = false;
                }
            }
            Cmd::TableOfContents => {
                let mut start = "1".to_string();
                if self.is_left_brace_ahead() {
                    start = self.get_argument(false);
                }
                let unit = self.get_sectioning_unit();
                self.append(Atom::with_string(
                    AtomType::TableOfContents,
                    format!("{},{}", start, unit),
                ));
            }
            Cmd::Target => {
                let name = self.get_rest_of_line();
                self.insert_target(&name, false);
            }
            Cmd::Tt => self.start_format(FORMATTING_TELETYPE.to_string(), cmd),
            Cmd::UiControl => self.start_format(FORMATTING_UICONTROL.to_string(), cmd),
            Cmd::Underline => self.start_format(FORMATTING_UNDERLINE.to_string(), cmd),
            Cmd::Unicode => {
                self.enter_para();
                let arg = self.get_argument(false);
                match parse_code_point(&arg) {
                    Some(ch) => self.append_char_atom(ch),
                    None => self.warn(format!(
                        "invalid Unicode character '{}' specified with '{}'",
                        arg,
                        self.cmd_name(Cmd::Unicode)
                    )),
                }
            }
            Cmd::Value => self.parse_value_item(),
            Cmd::Warning => {
                self.leave_para();
                self.enter_para();
                self.append(Atom::with_string(AtomType::FormattingLeft, FORMATTING_BOLD));
                self.append(Atom::with_string(AtomType::String, "Warning:"));
                self.append(Atom::with_string(
                    AtomType::FormattingRight,
                    FORMATTING_BOLD,
                ));
                self.append(Atom::with_string(AtomType::String, " "));
            }
        }
        Ok(())
    }

    /// Backslash words that are not built-in commands: metacommands and
    /// topics from the symbol database, then user macros, then unknown.
    fn not_a_command(&mut self, cmd_str: &str) {
        if self.meta_commands.contains(cmd_str) {
            self.doc.metacommands_used.insert(cmd_str.to_string());
            let arg = self.get_meta_command_argument(cmd_str);
            let position = self.location();
            self.doc
                .metacommand_map
                .entry(cmd_str.to_string())
                .or_default()
                .push(ArgLoc {
                    arg: arg.clone(),
                    position,
                });
            if self.topic_commands.contains(cmd_str) {
                self.doc.topics.push(Topic {
                    topic: cmd_str.to_string(),
                    args: arg,
                });
            }
        } else if let Some(macro_) = self.compiler.macros().get(cmd_str) {
            let macro_ = macro_.clone();
            self.expand_macro_call(cmd_str, &macro_);
        } else {
            let note = self.unknown_command_note(cmd_str);
            match note {
                Some(note) => self.warn_with_note(
                    format!("unknown command '\\{}'", cmd_str),
                    note,
                ),
                None => self.warn(format!("unknown command '\\{}'", cmd_str)),
            }
            // keep the text after the unknown command verbatim, spaces
            // included, so the source can be reconstructed from the atoms
            let saved = self.pos;
            self.enter_para();
            self.pos = saved;
            self.append(Atom::with_string(AtomType::UnknownCommand, cmd_str));
        }
    }

    fn unknown_command_note(&self, cmd_str: &str) -> Option<String> {
        if let Some(new_name) = self.compiler.commands().renamed_to(cmd_str) {
            return Some(format!(
                "the command '\\{}' was renamed '\\{}' by the configuration, use the new name",
                cmd_str, new_name
            ));
        }
        let candidates = self
            .compiler
            .commands()
            .all_names()
            .chain(self.meta_commands.iter().map(String::as_str));
        nearest_name(cmd_str, candidates).map(|best| format!("maybe you meant '\\{}'?", best))
    }

    // ----- macros ---------------------------------------------------------

    fn expand_macro_call(&mut self, name: &str, macro_: &Macro) {
        let args = if macro_.num_params > 0 {
            self.capture_macro_args(name, macro_.num_params)
        } else {
            Vec::new()
        };

        let mut pending_endifs = 0;
        let mut defs = macro_.other_defs.iter().peekable();
        while let Some((format, def)) = defs.next() {
            self.append(Atom::with_string(AtomType::FormatIf, format.clone()));
            self.emit_macro_body(def, &args, macro_.num_params);
            if defs.peek().is_none() {
                self.append(Atom::new(AtomType::FormatEndif));
            } else {
                self.append(Atom::new(AtomType::FormatElse));
                pending_endifs += 1;
            }
        }
        for _ in 0..pending_endifs {
            self.append(Atom::new(AtomType::FormatEndif));
        }

        if let Some(def) = &macro_.default_def {
            if !macro_.other_defs.is_empty() {
                let position = macro_
                    .default_def_position
                    .clone()
                    .unwrap_or_else(|| self.location());
                self.doc.diagnostics.warning(
                    position,
                    format!(
                        "macro '\\{}' cannot have both format-specific and default definitions",
                        name
                    ),
                );
            } else {
                let expansion = macros::substitute_to_string(def, &args, macro_.num_params);
                let file = macro_
                    .default_def_position
                    .as_ref()
                    .map(|p| p.file.clone())
                    .unwrap_or_default();
                self.splice_input(&expansion, &file);
            }
        }
    }

    fn capture_macro_args(&mut self, name: &str, num_params: usize) -> Vec<String> {
        let mut args = Vec::new();
        for i in 0..num_params {
            if num_params == 1 || self.is_left_brace_ahead() {
                args.push(self.get_argument(true));
            } else {
                self.warn(format!(
                    "macro '\\{}' invoked with too few arguments (expected {}, got {})",
                    name, num_params, i
                ));
                break;
            }
        }
        args
    }

    /// Replays one macro body as atoms: literal spans become `RawString`,
    /// placeholders become `String` atoms carrying the captured argument.
    fn emit_macro_body(&mut self, def: &str, args: &[String], num_params: usize) {
        if num_params == 0 {
            self.append(Atom::with_string(AtomType::RawString, def));
            return;
        }
        for segment in macros::split_segments(def, num_params) {
            match segment {
                MacroSegment::Raw(text) => {
                    self.append(Atom::with_string(AtomType::RawString, text));
                }
                MacroSegment::Param(i) => {
                    let arg = args.get(i - 1).cloned().unwrap_or_default();
                    self.append(Atom::with_string(AtomType::String, arg));
                }
            }
        }
    }

    // ----- preprocessor conditionals -------------------------------------

    fn preprocessor_if(&mut self) {
        let condition = self.get_rest_of_line();
        let truth = self.eval_condition(&condition);
        self.preprocessor_skipping.push(!truth);
        if !truth {
            self.num_preprocessor_skipping += 1;
        }
        if self.num_preprocessor_skipping > 0 {
            self.skip_to_next_preprocessor_command();
        }
    }

    fn preprocessor_else(&mut self) {
        match self.preprocessor_skipping.last_mut() {
            None => {
                self.warn(format!("unexpected '{}'", self.cmd_name(Cmd::Else)));
                return;
            }
            Some(top) => {
                if *top {
                    self.num_preprocessor_skipping -= 1;
                } else {
                    self.num_preprocessor_skipping += 1;
                }
                *top = !*top;
            }
        }
        let _ = self.get_rest_of_line();
        if self.num_preprocessor_skipping > 0 {
            self.skip_to_next_preprocessor_command();
        }
    }

    fn preprocessor_endif(&mut self) {
        if self.preprocessor_skipping.is_empty() {
            self.warn(format!("unexpected '{}'", self.cmd_name(Cmd::EndIf)));
            return;
        }
        if self.preprocessor_skipping.pop() == Some(true) {
            self.num_preprocessor_skipping -= 1;
        }
        let _ = self.get_rest_of_line();
        if self.num_preprocessor_skipping > 0 {
            self.skip_to_next_preprocessor_command();
        }
    }

    /// While skipping, jump straight to the next preprocessor command by
    /// pattern search instead of reprocessing every character.
    fn skip_to_next_preprocessor_command(&mut self) {
        let target = match &self.preproc_re {
            Some(re) => self.find_from(re, self.pos + 1).map(|(start, _)| start),
            None => None,
        };
        self.pos = target.unwrap_or(self.input.len());
    }

    fn eval_condition(&mut self, condition: &str) -> bool {
        let settings = self.compiler.settings();
        match eval_format_expr(condition, &settings.output_format, &settings.defines) {
            Some(truth) => truth,
            None => {
                self.warn(format!(
                    "invalid condition '{}' after '{}'",
                    condition,
                    self.cmd_name(Cmd::If)
                ));
                false
            }
        }
    }

    // ----- includes -------------------------------------------------------

    fn include(&mut self, file: &str, identifier: &str) -> Result<(), ParseError> {
        let position = self.location();
        if self.cached_loc.depth() > self.compiler.settings().max_include_depth {
            return Err(ParseError::TooManyNestedIncludes { position });
        }

        let path = self.resolve_include(file).ok_or_else(|| {
            ParseError::IncludeNotFound {
                file: file.to_string(),
                position: position.clone(),
            }
        })?;

        let contents = std::fs::read_to_string(&path).map_err(|e| ParseError::IncludeUnreadable {
            file: file.to_string(),
            position: position.clone(),
            reason: e.to_string(),
        })?;

        let friendly = path.to_string_lossy().to_string();
        if identifier.is_empty() {
            self.splice_input(&contents, &friendly);
            return Ok(());
        }

        match extract_snippet(&contents, identifier) {
            Some(snippet) if !snippet.is_empty() => {
                self.splice_input(&snippet, &friendly);
            }
            Some(_) => {
                self.warn(format!("empty snippet '{}' in '{}'", identifier, friendly));
            }
            None => {
                self.warn(format!("cannot find '{}' in '{}'", identifier, friendly));
            }
        }
        Ok(())
    }

    fn resolve_include(&self, file: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(file);
        if direct.is_file() {
            return Some(direct);
        }
        self.compiler
            .settings()
            .include_paths
            .iter()
            .map(|dir| dir.join(file))
            .find(|p| p.is_file())
    }

    // ----- formatting spans ----------------------------------------------

    fn start_format(&mut self, format: String, cmd: Cmd) {
        self.enter_para();

        if self.pending_formats.values().any(|f| *f == format) {
            self.warn(format!("cannot nest '{}' commands", self.cmd_name(cmd)));
            return;
        }

        self.append(Atom::with_string(AtomType::FormattingLeft, format.clone()));

        if self.is_left_brace_ahead() {
            self.skip_spaces_or_one_endl();
            self.pending_formats.insert(self.brace_depth, format);
            self.brace_depth += 1;
            self.pos += 1;
        } else {
            let arg = self.get_argument(false);
            self.append(Atom::with_string(AtomType::String, arg));
            self.append(Atom::with_string(AtomType::FormattingRight, format.clone()));
            if format == FORMATTING_INDEX && self.index_started_para {
                self.skip_all_spaces();
                self.index_started_para = false;
            }
        }
    }

    fn handle_close_brace(&mut self) {
        self.brace_depth -= 1;
        self.pos += 1;

        match self.pending_formats.remove(&self.brace_depth) {
            None => {
                self.enter_para();
                self.append_char('}');
            }
            Some(format) => {
                self.append(Atom::with_string(AtomType::FormattingRight, format.clone()));
                if format == FORMATTING_INDEX {
                    if self.index_started_para {
                        self.skip_all_spaces();
                    }
                } else if format == FORMATTING_LINK {
                    // links written as \l {Namespace::}{member()}: the second
                    // brace group extends the link target
                    if let Some(link_index) = self.current_link_atom.take() {
                        let needs_suffix = self
                            .doc
                            .body
                            .atoms()
                            .get(link_index)
                            .map_or(false, |a| a.string().ends_with("::"));
                        if needs_suffix {
                            let suffix = plain_string(&self.doc.body.atoms()[link_index + 1..]);
                            if let Some(atom) = self.doc.body.atom_mut(link_index) {
                                atom.append_string(&suffix);
                            }
                        }
                    }
                }
            }
        }
    }

    fn parse_link_shorthand(&mut self, cmd: Cmd) {
        self.enter_para();
        let braced = self.is_left_brace_ahead();
        let target = self.get_argument(false);
        self.append(Atom::with_string(AtomType::Link, target.clone()));
        if braced && self.is_left_brace_ahead() {
            // \l {target} {text}: the text is parsed as ordinary markup
            self.current_link_atom = Some(self.doc.body.last_index());
            self.start_format(FORMATTING_LINK.to_string(), cmd);
        } else {
            self.append(Atom::with_string(AtomType::FormattingLeft, FORMATTING_LINK));
            self.append(Atom::with_string(AtomType::String, clean_link(&target)));
            self.append(Atom::with_string(
                AtomType::FormattingRight,
                FORMATTING_LINK,
            ));
        }
    }

    // ----- open/close command nesting ------------------------------------

    /// Legality of opening `cmd` inside the innermost open command. `\link`
    /// may appear anywhere; `\footnote` and `\link` admit no nested opens.
    fn open_command(&mut self, cmd: Cmd) -> bool {
        let outer = *self.opened_commands.last().unwrap_or(&Cmd::Omit);
        let ok = if cmd == Cmd::Link {
            true
        } else {
            match outer {
                Cmd::List => matches!(cmd, Cmd::Footnote | Cmd::List),
                Cmd::Abstract => matches!(cmd, Cmd::List | Cmd::Quotation | Cmd::Table),
                Cmd::Sidebar => matches!(cmd, Cmd::List | Cmd::Quotation | Cmd::Sidebar),
                Cmd::Quotation => cmd == Cmd::List,
                Cmd::Table => matches!(cmd, Cmd::List | Cmd::Footnote | Cmd::Quotation),
                Cmd::Footnote | Cmd::Link => false,
                _ => true,
            }
        };

        if ok {
            self.opened_commands.push(cmd);
        } else {
            self.warn(format!(
                "cannot use '{}' in '{}'",
                self.cmd_name(cmd),
                self.cmd_name(outer)
            ));
        }
        ok
    }

    /// Matches a closing command against the open-command stack: an exact
    /// match pops it; a match deeper in the stack pops every skipped level
    /// with one warning each; no match warns once and changes nothing.
    fn close_command(&mut self, end_cmd: Cmd) -> bool {
        let top = *self.opened_commands.last().unwrap_or(&Cmd::Omit);
        if top.end_cmd() == end_cmd && self.opened_commands.len() > 1 {
            self.opened_commands.pop();
            return true;
        }

        let contains = self.opened_commands[1..]
            .iter()
            .any(|c| c.end_cmd() == end_cmd);
        if contains {
            while self.opened_commands.len() > 1 {
                let top = *self.opened_commands.last().unwrap_or(&Cmd::Omit);
                if top.end_cmd() == end_cmd {
                    self.opened_commands.pop();
                    return true;
                }
                self.warn(format!(
                    "missing '{}' before '{}'",
                    self.end_cmd_name(top),
                    self.cmd_name(end_cmd)
                ));
                self.opened_commands.pop();
            }
            false
        } else {
            self.warn(format!("unexpected '{}'", self.cmd_name(end_cmd)));
            false
        }
    }

    // ----- sections -------------------------------------------------------

    /// Opens a heading at `level`, first closing any open section of equal
    /// or deeper level, and records the heading for the table of contents.
    fn start_section(&mut self, level: i32) {
        self.leave_value_list();
        self.leave_para();

        while let Some(&top) = self.open_sections.last() {
            if top >= level {
                self.append(Atom::with_string(AtomType::SectionRight, top.to_string()));
                self.open_sections.pop();
            } else {
                break;
            }
        }

        self.append(Atom::with_string(AtomType::SectionLeft, level.to_string()));
        self.open_sections.push(level);
        self.doc.table_of_contents.push(TocEntry {
            atom_index: self.doc.body.last_index(),
            level,
        });
        self.enter_para_with(
            AtomType::SectionHeadingLeft,
            AtomType::SectionHeadingRight,
            level.to_string(),
        );
    }

    fn end_section(&mut self, level: i32, end_cmd: Cmd) {
        self.leave_para();
        if self.open_sections.is_empty() {
            self.warn(format!("unexpected '{}'", self.cmd_name(end_cmd)));
            return;
        }
        while let Some(&top) = self.open_sections.last() {
            if top >= level {
                self.append(Atom::with_string(AtomType::SectionRight, top.to_string()));
                self.open_sections.pop();
            } else {
                break;
            }
        }
    }

    fn get_sectioning_unit(&mut self) -> i32 {
        let name = self.get_optional_argument();
        match name.as_str() {
            "part" => SECTION_PART,
            "chapter" => SECTION_CHAPTER,
            "section1" => 1,
            "section2" => 2,
            "section3" => 3,
            "section4" => 4,
            "" => SECTION_NONE,
            other => {
                self.warn(format!("invalid section '{}'", other));
                SECTION_NONE
            }
        }
    }

    // ----- lists and tables ----------------------------------------------

    fn parse_list_or_table_item(&mut self) {
        self.leave_para();
        match self.opened_commands.last() {
            Some(&Cmd::List) => {
                let (started, number, style) = match self.opened_lists.last_mut() {
                    Some(list) => {
                        let started = list.is_started();
                        list.next();
                        (started, list.number_string(), list.style_string())
                    }
                    None => return,
                };
                if started {
                    self.append(Atom::with_string(AtomType::ListItemRight, style));
                } else {
                    self.append(Atom::with_string(AtomType::ListLeft, style));
                }
                self.append(Atom::with_string(AtomType::ListItemNumber, number));
                self.append(Atom::with_string(AtomType::ListItemLeft, style));
                self.enter_para();
            }
            Some(&Cmd::Table) => {
                let mut span = "1,1".to_string();
                let mut attr = String::new();
                if self.is_left_brace_ahead() {
                    span = self.get_argument(false);
                    if self.is_left_brace_ahead() {
                        attr = self.get_argument(false);
                    }
                }

                if !self.in_table_header && !self.in_table_row {
                    self.warn(format!(
                        "missing '{}' or '{}' before '{}'",
                        self.cmd_name(Cmd::Header),
                        self.cmd_name(Cmd::Row),
                        self.cmd_name(Cmd::Li)
                    ));
                    self.append(Atom::new(AtomType::TableRowLeft));
                    self.in_table_row = true;
                } else if self.in_table_item {
                    self.append(Atom::new(AtomType::TableItemRight));
                    self.in_table_item = false;
                }

                self.append(Atom::with_strings(AtomType::TableItemLeft, span, attr));
                self.in_table_item = true;
            }
            _ => {
                self.warn(format!(
                    "command '{}' outside of '{}' and '{}'",
                    self.cmd_name(Cmd::Li),
                    self.cmd_name(Cmd::List),
                    self.cmd_name(Cmd::Table)
                ));
            }
        }
    }

    fn parse_value_item(&mut self) {
        self.leave_value();
        if self.opened_lists.last().map(OpenedList::style) == Some(ListStyle::Value) {
            let name = self.get_argument(false);
            if !self.doc.enum_item_list.contains(&name) {
                self.doc.enum_item_list.push(name.clone());
            }

            let style = ListStyle::Value.style_string();
            if let Some(list) = self.opened_lists.last_mut() {
                list.next();
            }
            self.append(Atom::with_string(AtomType::ListTagLeft, style));
            self.append(Atom::with_string(AtomType::String, name));
            self.append(Atom::with_string(AtomType::ListTagRight, style));
            self.append(Atom::with_string(AtomType::ListItemLeft, style));

            self.skip_spaces_or_one_endl();
            if self.is_blank_line() {
                self.append(Atom::new(AtomType::Nop));
            }
        } else {
            self.warn(format!("unexpected '{}'", self.cmd_name(Cmd::Value)));
        }
    }

    fn misplaced_table_command(&mut self, cmd: Cmd) {
        if self.opened_commands.contains(&Cmd::Table) {
            let outer = *self.opened_commands.last().unwrap_or(&Cmd::Omit);
            self.warn(format!(
                "cannot use '{}' within '{}'",
                self.cmd_name(cmd),
                self.cmd_name(outer)
            ));
        } else {
            self.warn(format!(
                "cannot use '{}' outside of '{}'",
                self.cmd_name(cmd),
                self.cmd_name(Cmd::Table)
            ));
        }
    }

    // ----- targets and see-also ------------------------------------------

    fn insert_target(&mut self, name: &str, keyword: bool) {
        if let Some(previous) = self.target_map.get(name).cloned() {
            self.warn(format!("duplicate target name '{}'", name));
            self.doc
                .diagnostics
                .warning(previous, "(the previous occurrence is here)");
            return;
        }
        let position = self.location();
        self.target_map.insert(name.to_string(), position);
        if keyword {
            self.append(Atom::with_string(AtomType::Keyword, name));
            self.doc.keywords.push(TargetRef {
                name: name.to_string(),
                atom_index: self.doc.body.last_index(),
            });
        } else {
            self.append(Atom::with_string(AtomType::Target, name));
            self.doc.targets.push(TargetRef {
                name: name.to_string(),
                atom_index: self.doc.body.last_index(),
            });
        }
    }

    fn parse_also(&mut self) {
        self.leave_para();
        self.skip_spaces_on_line();
        while self.pos < self.input.len() && self.input[self.pos] != '\n' {
            let target;
            let text;

            if self.input[self.pos] == '{' {
                let t = self.get_argument(false);
                self.skip_spaces_on_line();
                if self.pos < self.input.len() && self.input[self.pos] == '{' {
                    let s = self.get_argument(false);
                    // {Namespace::}{member()} extends the target
                    if t.ends_with("::") {
                        target = format!("{}{}", t, s);
                    } else {
                        target = t;
                    }
                    text = s;
                } else {
                    text = t.clone();
                    target = t;
                }
            } else {
                target = self.get_argument(false);
                text = clean_link(&target);
            }

            let mut also = Text::new();
            also.append(Atom::with_string(AtomType::Link, target));
            also.append(Atom::with_string(AtomType::FormattingLeft, FORMATTING_LINK));
            also.append(Atom::with_string(AtomType::String, text));
            also.append(Atom::with_string(
                AtomType::FormattingRight,
                FORMATTING_LINK,
            ));
            self.doc.also_list.push(also);

            self.skip_spaces_on_line();
            if self.pos < self.input.len() && self.input[self.pos] == ',' {
                self.pos += 1;
                self.skip_spaces_or_one_endl();
            } else if self.pos < self.input.len() && self.input[self.pos] != '\n' {
                self.warn(format!("missing comma in '{}'", self.cmd_name(Cmd::Sa)));
            }
        }
    }

    // ----- paragraph state -----------------------------------------------

    fn enter_para(&mut self) {
        self.enter_para_with(AtomType::ParaLeft, AtomType::ParaRight, String::new());
    }

    fn enter_para_with(&mut self, left: AtomType, right: AtomType, string: String) {
        if self.para_state != ParagraphState::Outside {
            return;
        }

        let last = self.doc.body.last_atom().map(Atom::atype);
        if last != Some(AtomType::ListItemLeft) && last != Some(AtomType::DivLeft) {
            self.leave_value_list();
        }

        self.append(Atom::with_string(left, string.clone()));
        self.index_started_para = false;
        self.pending_para_left = left;
        self.pending_para_right = right;
        self.pending_para_string = string;
        self.para_state = if left == AtomType::SectionHeadingLeft {
            ParagraphState::InSingleLine
        } else {
            ParagraphState::InMultiLine
        };
        self.skip_spaces_or_one_endl();
    }

    fn leave_para(&mut self) {
        if self.para_state == ParagraphState::Outside {
            return;
        }

        if !self.pending_formats.is_empty() {
            self.warn("missing '}'");
            self.pending_formats.clear();
        }

        if self.doc.body.last_atom().map(Atom::atype) == Some(self.pending_para_left) {
            // empty paragraph: drop the left atom instead of closing it
            self.doc.body.strip_last_atom();
        } else {
            if let Some(last) = self.doc.body.last_atom_mut() {
                if last.atype() == AtomType::String && last.string().ends_with(' ') {
                    last.chop_string();
                }
            }
            let right = self.pending_para_right;
            let string = std::mem::take(&mut self.pending_para_string);
            self.append(Atom::with_string(right, string));
        }
        self.para_state = ParagraphState::Outside;
        self.index_started_para = false;
        self.pending_para_right = AtomType::Nop;
        self.pending_para_string.clear();
    }

    fn leave_value(&mut self) {
        self.leave_para();
        if self.opened_lists.is_empty() {
            self.opened_lists.push(OpenedList::new(ListStyle::Value));
            self.append(Atom::with_string(
                AtomType::ListLeft,
                ListStyle::Value.style_string(),
            ));
        } else {
            if self.doc.body.last_atom().map(Atom::atype) == Some(AtomType::Nop) {
                self.doc.body.strip_last_atom();
            }
            self.append(Atom::with_string(
                AtomType::ListItemRight,
                ListStyle::Value.style_string(),
            ));
        }
    }

    fn leave_value_list(&mut self) {
        self.leave_para();
        if self.opened_lists.last().map(OpenedList::style) == Some(ListStyle::Value) {
            if self.doc.body.last_atom().map(Atom::atype) == Some(AtomType::Nop) {
                self.doc.body.strip_last_atom();
            }
            let style = ListStyle::Value.style_string();
            self.append(Atom::with_string(AtomType::ListItemRight, style));
            self.append(Atom::with_string(AtomType::ListRight, style));
            self.opened_lists.pop();
        }
    }

    fn leave_table_row(&mut self) {
        if self.in_table_item {
            self.leave_para();
            self.append(Atom::new(AtomType::TableItemRight));
            self.in_table_item = false;
        }
        if self.in_table_header {
            self.append(Atom::new(AtomType::TableHeaderRight));
            self.in_table_header = false;
        }
        if self.in_table_row {
            self.append(Atom::new(AtomType::TableRowRight));
            self.in_table_row = false;
        }
    }

    // ----- plain text -----------------------------------------------------

    fn handle_text_char(&mut self, ch: char) {
        let new_word;
        if self.para_state == ParagraphState::Outside {
            if ch.is_whitespace() {
                self.pos += 1;
                new_word = false;
            } else {
                self.enter_para();
                new_word = true;
            }
        } else if ch.is_whitespace() {
            self.pos += 1;
            if ch == '\n'
                && (self.para_state == ParagraphState::InSingleLine || self.is_blank_line())
            {
                self.leave_para();
            } else {
                self.append_char(' ');
            }
            new_word = false;
        } else {
            new_word = true;
        }

        if !new_word {
            return;
        }

        // scan one word and classify it: internal uppercase, '::', '_'/'@'
        // or a trailing '()' mark a code symbol to auto-link
        let start_pos = self.pos;
        let mut num_internal_uppercase = 0;
        let mut num_lowercase = 0;
        let mut num_strange_symbols = 0;

        while self.pos < self.input.len() {
            let c = self.input[self.pos];
            if c.is_ascii_lowercase() {
                num_lowercase += 1;
                self.pos += 1;
            } else if c.is_ascii_uppercase() {
                if self.pos > start_pos {
                    num_internal_uppercase += 1;
                }
                self.pos += 1;
            } else if c.is_ascii_digit() {
                if self.pos > start_pos {
                    self.pos += 1;
                } else {
                    break;
                }
            } else if c == '_' || c == '@' {
                num_strange_symbols += 1;
                self.pos += 1;
            } else if c == ':'
                && self.pos + 1 < self.input.len()
                && self.input[self.pos + 1] == ':'
            {
                num_strange_symbols += 1;
                self.pos += 2;
            } else if c == '(' {
                if self.pos > start_pos
                    && self.pos + 1 < self.input.len()
                    && self.input[self.pos + 1] == ')'
                {
                    num_strange_symbols += 1;
                    self.pos += 2;
                    break;
                } else {
                    break;
                }
            } else if c.is_alphabetic() {
                // non-ASCII letters count as ordinary prose
                num_lowercase += 1;
                self.pos += 1;
            } else {
                break;
            }
        }

        if self.pos == start_pos {
            if !ch.is_whitespace() {
                self.append_char(ch);
                self.pos += 1;
            }
        } else {
            let word: String = self.input[start_pos..self.pos].iter().collect();
            if (num_internal_uppercase >= 1 && num_lowercase >= 2) || num_strange_symbols >= 1 {
                self.append(Atom::with_string(AtomType::AutoLink, word));
            } else {
                self.append_word(&word);
            }
        }
    }

    // ----- append helpers -------------------------------------------------

    fn append(&mut self, atom: Atom) {
        self.chop_trailing_code_newline();
        self.doc.body.append(atom);
    }

    /// Code blocks keep single trailing newlines only; a command following a
    /// code block chops the blank line the block captured.
    fn chop_trailing_code_newline(&mut self) {
        if let Some(last) = self.doc.body.last_atom_mut() {
            if last.atype() == AtomType::Code && last.string().ends_with("\n\n") {
                last.chop_string();
            }
        }
    }

    fn append_char(&mut self, ch: char) {
        self.doc.body.append_char(ch);
    }

    fn append_char_atom(&mut self, ch: char) {
        self.append(Atom::with_string(AtomType::String, ch.to_string()));
    }

    fn append_word(&mut self, word: &str) {
        self.doc.body.append_word(word);
    }

    fn append_to_code(&mut self, code: &str) {
        if self.doc.body.last_atom().map(Atom::atype) == Some(AtomType::Code) {
            if let Some(last) = self.doc.body.last_atom_mut() {
                last.append_string(code);
            }
        } else {
            self.append(Atom::with_string(AtomType::Code, code));
        }
    }

    // ----- argument readers ----------------------------------------------

    /// An argument enclosed in braces, without the braces. Inner brace pairs
    /// must balance; a missing closing brace warns and takes what was
    /// scanned.
    fn get_braced_argument(&mut self, verbatim: bool) -> String {
        let mut arg = String::new();
        let mut delim_depth: i32 = 0;
        if self.pos < self.input.len() && self.input[self.pos] == '{' {
            self.pos += 1;
            while self.pos < self.input.len() && delim_depth >= 0 {
                match self.input[self.pos] {
                    '{' => {
                        delim_depth += 1;
                        arg.push('{');
                        self.pos += 1;
                    }
                    '}' => {
                        delim_depth -= 1;
                        if delim_depth >= 0 {
                            arg.push('}');
                        }
                        self.pos += 1;
                    }
                    '\\' => {
                        if verbatim {
                            arg.push('\\');
                            self.pos += 1;
                        } else {
                            self.pos += 1;
                            if self.pos < self.input.len() {
                                let c = self.input[self.pos];
                                if c.is_alphanumeric() {
                                    continue;
                                }
                                arg.push(c);
                                if c.is_whitespace() {
                                    self.skip_all_spaces();
                                } else {
                                    self.pos += 1;
                                }
                            }
                        }
                    }
                    c => {
                        arg.push(c);
                        self.pos += 1;
                    }
                }
            }
            if delim_depth > 0 {
                self.warn("missing '}'");
            }
        }
        arg
    }

    /// Typically an argument ends at the next whitespace, but braces group
    /// words and parentheses/brackets must balance, so `printf("%d\n", x)`
    /// is one argument. Trailing punctuation and `'s` are not included.
    fn get_argument(&mut self, verbatim: bool) -> String {
        simplified(&self.get_argument_impl(verbatim))
    }

    fn get_argument_impl(&mut self, verbatim: bool) -> String {
        self.skip_spaces_or_one_endl();

        let mut delim_depth: i32 = 0;
        let start_pos = self.pos;
        let mut arg = self.get_braced_argument(verbatim);
        if !arg.is_empty() {
            return arg;
        }

        while self.pos < self.input.len()
            && (delim_depth > 0 || !self.input[self.pos].is_whitespace())
        {
            match self.input[self.pos] {
                '(' | '[' | '{' => {
                    delim_depth += 1;
                    arg.push(self.input[self.pos]);
                    self.pos += 1;
                }
                ')' | ']' | '}' => {
                    delim_depth -= 1;
                    if self.pos == start_pos || delim_depth >= 0 {
                        arg.push(self.input[self.pos]);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                '\\' => {
                    if verbatim {
                        arg.push('\\');
                        self.pos += 1;
                    } else {
                        self.pos += 1;
                        if self.pos < self.input.len() {
                            let c = self.input[self.pos];
                            if c.is_alphanumeric() {
                                break;
                            }
                            arg.push(c);
                            if c.is_whitespace() {
                                self.skip_all_spaces();
                            } else {
                                self.pos += 1;
                            }
                        }
                    }
                }
                c => {
                    arg.push(c);
                    self.pos += 1;
                }
            }
        }

        if arg.chars().count() > 1
            && self.pos > 0
            && ".,:;!?".contains(self.input[self.pos - 1])
            && !arg.ends_with("...")
        {
            arg.pop();
            self.pos -= 1;
        }
        if arg.chars().count() > 2 && arg.ends_with("'s") {
            arg.truncate(arg.len() - 2);
            self.pos -= 2;
        }
        arg
    }

    /// An argument that is absent when the next thing is another command.
    fn get_optional_argument(&mut self) -> String {
        self.skip_spaces_or_one_endl();
        if self.pos + 1 < self.input.len()
            && self.input[self.pos] == '\\'
            && self.input[self.pos + 1].is_alphanumeric()
        {
            String::new()
        } else {
            self.get_argument(false)
        }
    }

    /// The rest of the line, with a trailing backslash continuing onto the
    /// next line.
    fn get_rest_of_line(&mut self) -> String {
        let mut t = String::new();
        self.skip_spaces_on_line();

        let mut trailing_slash = false;
        loop {
            let begin = self.pos;

            while self.pos < self.input.len() && self.input[self.pos] != '\n' {
                if self.input[self.pos] == '\\' && !trailing_slash {
                    trailing_slash = true;
                    self.pos += 1;
                    while self.pos < self.input.len()
                        && self.input[self.pos].is_whitespace()
                        && self.input[self.pos] != '\n'
                    {
                        self.pos += 1;
                    }
                } else {
                    trailing_slash = false;
                    self.pos += 1;
                }
            }

            if !t.is_empty() {
                t.push(' ');
            }
            let line: String = self.input[begin..self.pos].iter().collect();
            t.push_str(&simplified(&line));

            if trailing_slash {
                t.pop();
                t = simplified(&t);
            }
            if self.pos < self.input.len() {
                self.pos += 1;
            }
            if !(self.pos < self.input.len() && trailing_slash) {
                break;
            }
        }

        t
    }

    /// A metacommand argument runs to the end of the line, except that
    /// parentheses keep it open across newlines.
    fn get_meta_command_argument(&mut self, cmd_str: &str) -> String {
        self.skip_spaces_on_line();

        let begin = self.pos;
        let mut paren_depth = 0;
        while self.pos < self.input.len()
            && (self.input[self.pos] != '\n' || paren_depth > 0)
        {
            match self.input[self.pos] {
                '(' => paren_depth += 1,
                ')' => paren_depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == self.input.len() && paren_depth > 0 {
            self.pos = begin;
            self.warn(format!("unbalanced parentheses in '\\{}'", cmd_str));
        }

        let arg: String = self.input[begin..self.pos].iter().collect();
        let arg = simplified(&arg);
        self.skip_spaces_on_line();
        arg
    }

    /// Everything up to (and consuming) the matching end command, found by
    /// pattern search.
    fn get_until_end(&mut self, cmd: Cmd) -> String {
        let end_name = self.compiler.commands().end_name_of(cmd).to_string();
        let pattern = Regex::new(&format!(r"\\{}\b", regex::escape(&end_name))).ok();

        match pattern.and_then(|re| self.find_from(&re, self.pos)) {
            Some((start, end)) => {
                let t: String = self.input[self.pos..start].iter().collect();
                self.pos = end;
                t
            }
            None => {
                self.warn(format!("missing '\\{}'", end_name));
                self.pos = self.input.len();
                String::new()
            }
        }
    }

    /// Captures a code block: untabified, stripped of the common leading
    /// indentation seen so far, then marked up.
    fn get_code(&mut self, cmd: Cmd, marker: Option<&dyn CodeMarker>) -> String {
        let raw = self.get_until_end(cmd);
        let code = self.untabify(&raw);
        let indent = indent_level(&code);
        if indent < self.min_indent {
            self.min_indent = indent;
        }
        let code = unindent(self.min_indent, &code);
        let marker = marker.unwrap_or_else(|| self.compiler.markers().marker_for_code(&code));
        marker.marked_up_code(&code)
    }

    fn untabify(&self, s: &str) -> String {
        untabify_etc(s, self.compiler.settings().tab_size)
    }

    /// Byte-offset regex search translated back into char positions.
    fn find_from(&self, re: &Regex, from: usize) -> Option<(usize, usize)> {
        if from >= self.input.len() {
            return None;
        }
        let hay: String = self.input[from..].iter().collect();
        re.find(&hay).map(|m| {
            let start = from + hay[..m.start()].chars().count();
            let end = from + hay[..m.end()].chars().count();
            (start, end)
        })
    }

    // ----- scanning helpers ----------------------------------------------

    fn is_blank_line(&self) -> bool {
        let mut i = self.pos;
        while i < self.input.len() && self.input[i].is_whitespace() {
            if self.input[i] == '\n' {
                return true;
            }
            i += 1;
        }
        false
    }

    fn is_left_brace_ahead(&self) -> bool {
        let mut num_endl = 0;
        let mut i = self.pos;
        while i < self.input.len() && self.input[i].is_whitespace() && num_endl < 2 {
            if self.input[i] == '\n' {
                num_endl += 1;
            }
            i += 1;
        }
        num_endl < 2 && i < self.input.len() && self.input[i] == '{'
    }

    fn skip_spaces_on_line(&mut self) {
        while self.pos < self.input.len()
            && self.input[self.pos].is_whitespace()
            && self.input[self.pos] != '\n'
        {
            self.pos += 1;
        }
    }

    /// Skips whitespace, but stops before a second newline so a blank line
    /// still terminates the paragraph.
    fn skip_spaces_or_one_endl(&mut self) {
        let mut first_endl: Option<usize> = None;
        while self.pos < self.input.len() && self.input[self.pos].is_whitespace() {
            if self.input[self.pos] == '\n' {
                match first_endl {
                    None => first_endl = Some(self.pos),
                    Some(first) => {
                        self.pos = first;
                        break;
                    }
                }
            }
            self.pos += 1;
        }
    }

    fn skip_all_spaces(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }
}

/// Collapses runs of whitespace and trims.
fn simplified(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `file:` and `mailto:` prefixes do not belong in link text.
fn clean_link(link: &str) -> String {
    match link.find(':') {
        Some(colon) if link.starts_with("file:") || link.starts_with("mailto:") => {
            simplified(&link[colon + 1..])
        }
        _ => link.to_string(),
    }
}

/// Accepts decimal, `0x` hex and `0` octal spellings, like the original's
/// base-detecting `toUInt`.
fn parse_code_point(s: &str) -> Option<char> {
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if s.len() > 1 && s.starts_with('0') {
        u32::from_str_radix(&s[1..], 8).ok()?
    } else {
        s.parse().ok()?
    };
    if value == 0 || value > 0xFFFD {
        return None;
    }
    char::from_u32(value)
}

/// Replaces tabs with spaces, strips carriage returns and trailing spaces,
/// and trims leading/extra trailing newlines.
fn untabify_etc(s: &str, tab_size: usize) -> String {
    let tab_size = tab_size.max(1);
    let mut result = String::with_capacity(s.len());
    let mut column = 0;

    for c in s.chars() {
        match c {
            '\r' => {}
            '\t' => {
                let n = tab_size - column % tab_size;
                for _ in 0..n {
                    result.push(' ');
                }
                column += n;
            }
            '\n' => {
                while result.ends_with(' ') {
                    result.pop();
                }
                result.push('\n');
                column = 0;
            }
            c => {
                result.push(c);
                column += 1;
            }
        }
    }

    while result.ends_with("\n\n") {
        result.pop();
    }
    while result.starts_with('\n') {
        result.remove(0);
    }
    result
}

/// Smallest column at which any non-space character appears.
fn indent_level(s: &str) -> usize {
    let mut min_indent = usize::MAX;
    let mut column = 0;
    for c in s.chars() {
        if c == '\n' {
            column = 0;
        } else {
            if c != ' ' && column < min_indent {
                min_indent = column;
            }
            column += 1;
        }
    }
    min_indent
}

fn unindent(level: usize, s: &str) -> String {
    if level == 0 || level == usize::MAX {
        return s.to_string();
    }
    let mut t = String::with_capacity(s.len());
    let mut column = 0;
    for c in s.chars() {
        if c == '\n' {
            t.push('\n');
            column = 0;
        } else {
            if column >= level {
                t.push(c);
            }
            column += 1;
        }
    }
    t
}

/// Extracts the lines between `//! identifier` marker comments, exclusive.
fn extract_snippet(contents: &str, identifier: &str) -> Option<String> {
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.trim_start().starts_with("//!") && l.contains(identifier))?
        + 1;

    let mut result = String::new();
    for line in &lines[start..] {
        if line.trim_start().starts_with("//!") && line.contains(identifier) {
            break;
        }
        result.push_str(line);
        result.push('\n');
    }
    Some(result)
}

// ----- `\if` condition expressions ---------------------------------------

#[derive(Debug, PartialEq)]
enum CondTok {
    Ident(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn cond_tokens(s: &str) -> Option<Vec<CondTok>> {
    let mut toks = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            toks.push(CondTok::LParen);
            i += 1;
        } else if c == ')' {
            toks.push(CondTok::RParen);
            i += 1;
        } else if c == '!' {
            toks.push(CondTok::Not);
            i += 1;
        } else if c == '&' && chars.get(i + 1) == Some(&'&') {
            toks.push(CondTok::And);
            i += 2;
        } else if c == '|' && chars.get(i + 1) == Some(&'|') {
            toks.push(CondTok::Or);
            i += 2;
        } else if c.is_alphanumeric() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            toks.push(CondTok::Ident(chars[start..i].iter().collect()));
        } else {
            return None;
        }
    }
    Some(toks)
}

struct CondParser<'a> {
    toks: &'a [CondTok],
    i: usize,
    format: &'a str,
    defines: &'a BTreeSet<String>,
}

impl<'a> CondParser<'a> {
    fn or_expr(&mut self) -> Option<bool> {
        let mut value = self.and_expr()?;
        while self.toks.get(self.i) == Some(&CondTok::Or) {
            self.i += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Some(value)
    }

    fn and_expr(&mut self) -> Option<bool> {
        let mut value = self.unary()?;
        while self.toks.get(self.i) == Some(&CondTok::And) {
            self.i += 1;
            let rhs = self.unary()?;
            value = value && rhs;
        }
        Some(value)
    }

    fn unary(&mut self) -> Option<bool> {
        match self.toks.get(self.i) {
            Some(CondTok::Not) => {
                self.i += 1;
                Some(!self.unary()?)
            }
            Some(CondTok::LParen) => {
                self.i += 1;
                let value = self.or_expr()?;
                if self.toks.get(self.i) != Some(&CondTok::RParen) {
                    return None;
                }
                self.i += 1;
                Some(value)
            }
            Some(CondTok::Ident(name)) => {
                self.i += 1;
                Some(name.eq_ignore_ascii_case(self.format) || self.defines.contains(name))
            }
            _ => None,
        }
    }
}

/// Evaluates a `\if` condition: identifiers are true when they name the
/// active output format (case-insensitively) or a configured define;
/// `!`, `&&`, `||` and parentheses combine them. `None` means malformed.
fn eval_format_expr(condition: &str, format: &str, defines: &BTreeSet<String>) -> Option<bool> {
    let toks = cond_tokens(condition)?;
    if toks.is_empty() {
        return None;
    }
    let mut parser = CondParser {
        toks: &toks,
        i: 0,
        format,
        defines,
    };
    let value = parser.or_expr()?;
    if parser.i != toks.len() {
        return None;
    }
    Some(value)
}
