//! RB-004: Recipe parsing.
//!
//! Grammar, one construct per line:
//! - header: `# builder format <float> [deb-version <template>]`
//! - base branch: `<url> [<revspec>]`
//! - `merge <name> <url> [<revspec>]`
//! - `nest <name> <url> <target-dir> [<revspec>]`
//! - `nest-part <name> <url> <revspec> <subpath> [<target-dir>]`
//! - `run <command...>`
//!
//! Indentation is two spaces per level and may only grow right after a
//! `nest` or `nest-part` line. Any violation aborts the whole parse.

use super::cursor::Cursor;
use super::error::{BuildError, ParseError, ParseErrorKind};
use super::format::{describe_options, instructions_at, FormatVersion, InstructionKind};
use super::types::{BranchNode, Instruction, RecipePlan};
use std::collections::HashSet;
use std::path::Path;

/// Filename reported in errors when the recipe did not come from a file.
pub const DEFAULT_FILENAME: &str = "recipe";

/// Product tag written in the header.
pub const PRODUCT_TAG: &str = "builder";

/// Older tools wrote this tag; still accepted on input.
const LEGACY_PRODUCT_TAG: &str = "bzr-builder";

/// Caller restrictions applied while parsing.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// `None` permits every instruction the format allows.
    permitted: Option<Vec<InstructionKind>>,
}

impl ParseOptions {
    /// Reject anything that would execute arbitrary commands.
    pub fn safe() -> Self {
        Self::permitting(&[
            InstructionKind::Merge,
            InstructionKind::Nest,
            InstructionKind::NestPart,
        ])
    }

    pub fn permitting(kinds: &[InstructionKind]) -> Self {
        Self {
            permitted: Some(kinds.to_vec()),
        }
    }

    fn permits(&self, kind: InstructionKind) -> bool {
        self.permitted
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&kind))
    }
}

/// Parse recipe text with default options.
pub fn parse_recipe(text: &str) -> Result<RecipePlan, ParseError> {
    parse_recipe_with(text, DEFAULT_FILENAME, &ParseOptions::default())
}

/// Parse recipe text, naming `filename` in any error.
pub fn parse_recipe_with(
    text: &str,
    filename: &str,
    options: &ParseOptions,
) -> Result<RecipePlan, ParseError> {
    RecipeParser::new(text, filename, options).parse()
}

/// Parse a recipe (or manifest) file from disk.
pub fn parse_recipe_file(path: &Path, options: &ParseOptions) -> Result<RecipePlan, BuildError> {
    let text = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    let plan = parse_recipe_with(&text, &path.display().to_string(), options)?;
    tracing::debug!(
        path = %path.display(),
        format = %plan.format(),
        branches = plan.root().walk().len(),
        "parsed recipe"
    );
    Ok(plan)
}

struct RecipeParser<'a> {
    cursor: Cursor,
    options: &'a ParseOptions,
    format: FormatVersion,
    seen_names: HashSet<String>,
}

impl<'a> RecipeParser<'a> {
    fn new(text: &str, filename: &str, options: &'a ParseOptions) -> Self {
        Self {
            cursor: Cursor::new(text, filename),
            options,
            format: super::format::NEWEST_FORMAT,
            seen_names: HashSet::new(),
        }
    }

    fn parse(mut self) -> Result<RecipePlan, ParseError> {
        let (format, deb_version) = self.parse_header()?;
        self.format = format;

        let mut root: Option<BranchNode> = None;
        // Child-index paths of the open scopes; the base branch is `[]`.
        let mut scopes: Vec<Vec<usize>> = Vec::new();
        let mut indent_level = 0usize;
        // Set when the previous real line may take indented children.
        let mut opened_scope: Option<Vec<usize>> = None;

        while !self.cursor.at_end() {
            if self.cursor.is_blank_or_comment() {
                self.cursor.advance_line();
                continue;
            }

            let new_level = self.parse_indent()?;
            if new_level > indent_level {
                if new_level - indent_level > 1 {
                    return Err(self.cursor.syntax("Indented by more than two spaces at once"));
                }
                match opened_scope.take() {
                    Some(path) => scopes.push(path),
                    None => {
                        return Err(self
                            .cursor
                            .syntax("Not allowed to indent unless after a 'nest' line"))
                    }
                }
            } else if new_level < indent_level {
                scopes.truncate(new_level + 1);
            }
            indent_level = new_level;

            opened_scope = match root.as_mut() {
                None => {
                    root = Some(self.parse_base_branch()?);
                    scopes = vec![Vec::new()];
                    None
                }
                Some(tree) => {
                    let parent = scopes.last().cloned().unwrap_or_default();
                    self.parse_instruction_line(tree, &parent)?
                }
            };
        }

        let root = root.ok_or_else(|| self.cursor.error("Empty recipe", ParseErrorKind::Empty))?;
        Ok(RecipePlan::new(root, deb_version, format))
    }

    // ------------------------------------------------------------------------
    // Header
    // ------------------------------------------------------------------------

    fn parse_header(&mut self) -> Result<(FormatVersion, Option<String>), ParseError> {
        self.cursor.expect_char('#')?;
        self.cursor.skip_whitespace();
        match self.cursor.peek_word() {
            None => {
                return Err(self
                    .cursor
                    .syntax(format!("End of line while looking for '{}'", PRODUCT_TAG)))
            }
            Some(tag) if tag == PRODUCT_TAG || tag == LEGACY_PRODUCT_TAG => {
                self.cursor.take_chars(tag.chars().count());
            }
            Some(other) => {
                return Err(self
                    .cursor
                    .syntax(format!("Expecting '{}', got '{}'", PRODUCT_TAG, other)))
            }
        }
        self.cursor.expect_word("format", true)?;
        let format = self.parse_format_version()?;
        let deb_version = self.parse_optional_deb_version()?;
        self.cursor.finish_line()?;
        Ok((format, deb_version))
    }

    fn parse_format_version(&mut self) -> Result<FormatVersion, ParseError> {
        self.cursor.require_whitespace("the format version")?;
        let word = self.cursor.peek_word().unwrap_or_default();
        let not_a_float = || format!("Expecting a float, got '{}'", word);

        let major = self.digits_at(0);
        if major.is_empty() {
            return Err(self.cursor.syntax(not_a_float()));
        }
        let mut length = major.len();
        let mut fraction = String::new();
        if self.cursor.peek_char(length) == Some('.') {
            fraction = self.digits_at(length + 1);
            if fraction.is_empty() {
                return Err(self.cursor.syntax(not_a_float()));
            }
            length += 1 + fraction.len();
        }

        let version = FormatVersion::from_parts(&major, &fraction)
            .ok_or_else(|| self.cursor.syntax(not_a_float()))?;
        if !version.is_supported() {
            let text: String = word.chars().take(length).collect();
            return Err(self.cursor.syntax(format!("Unknown format: '{}'", text)));
        }
        self.cursor.take_chars(length);
        Ok(version)
    }

    fn digits_at(&self, skip: usize) -> String {
        (skip..)
            .map_while(|i| self.cursor.peek_char(i).filter(char::is_ascii_digit))
            .collect()
    }

    fn parse_optional_deb_version(&mut self) -> Result<Option<String>, ParseError> {
        if self.cursor.peek_char(0).is_some() {
            self.cursor.require_whitespace("'deb-version'")?;
        }
        match self.cursor.peek_word() {
            None => Ok(None),
            Some(word) if word == "deb-version" => {
                self.cursor.take_chars(word.len());
                self.cursor.require_whitespace("a value for 'deb-version'")?;
                Ok(Some(self.cursor.take_word("a value for 'deb-version'")?))
            }
            Some(other) => Err(self
                .cursor
                .syntax(format!("Expecting 'deb-version', got '{}'", other))),
        }
    }

    // ------------------------------------------------------------------------
    // Lines
    // ------------------------------------------------------------------------

    fn parse_indent(&mut self) -> Result<usize, ParseError> {
        let indent = self.cursor.skip_whitespace();
        if indent.contains('\t') {
            return Err(self.cursor.syntax("Indents may not be done by tabs"));
        }
        if indent.len() % 2 != 0 {
            return Err(self.cursor.syntax("Indent not a multiple of two spaces"));
        }
        Ok(indent.len() / 2)
    }

    fn parse_base_branch(&mut self) -> Result<BranchNode, ParseError> {
        let location = self.cursor.take_word("the branch to start from")?;
        let revspec = self.parse_optional_word();
        self.cursor.finish_line()?;
        Ok(BranchNode::new(None, &location, revspec.as_deref()))
    }

    /// Parse one instruction into the scope at `parent`. Returns the new
    /// branch's path when the instruction may take indented children.
    fn parse_instruction_line(
        &mut self,
        root: &mut BranchNode,
        parent: &[usize],
    ) -> Result<Option<Vec<usize>>, ParseError> {
        let kind = self.parse_instruction()?;

        let instruction = match kind {
            InstructionKind::Run => {
                self.cursor.require_whitespace("the command")?;
                let command = self.cursor.take_rest_of_line().trim().to_string();
                if command.is_empty() {
                    return Err(self.cursor.syntax("End of line while looking for the command"));
                }
                self.cursor.finish_line()?;
                self.scope_mut(root, parent)?.run(&command);
                return Ok(None);
            }
            InstructionKind::Merge => {
                let mut branch = self.parse_branch_head()?;
                branch.revision_spec = self.parse_optional_word();
                Instruction::Merge { branch }
            }
            InstructionKind::Nest => {
                let mut branch = self.parse_branch_head()?;
                self.cursor.require_whitespace("the location to nest")?;
                let target_dir = self.take_target_dir(root, parent, "the location to nest")?;
                branch.revision_spec = self.parse_optional_word();
                Instruction::Nest { branch, target_dir }
            }
            InstructionKind::NestPart => {
                let mut branch = self.parse_branch_head()?;
                self.cursor.require_whitespace("the revision spec")?;
                branch.revision_spec = Some(self.cursor.take_word("the revision spec")?);
                self.cursor.require_whitespace("the path to nest")?;
                let source_subpath = self.cursor.take_word("the path to nest")?;
                self.cursor.skip_whitespace();
                let target_dir = if self.cursor.peek_word().is_some() {
                    self.take_target_dir(root, parent, "the target directory")?
                } else {
                    let default = default_target(&source_subpath);
                    self.check_target_free(root, parent, &default)?;
                    default
                };
                Instruction::NestPart {
                    branch,
                    source_subpath,
                    target_dir,
                }
            }
        };
        self.cursor.finish_line()?;

        let scope = self.scope_mut(root, parent)?;
        scope.children.push(instruction);
        let mut path = parent.to_vec();
        path.push(scope.children.len() - 1);
        Ok(kind.opens_scope().then_some(path))
    }

    fn parse_instruction(&mut self) -> Result<InstructionKind, ParseError> {
        let legal = instructions_at(&self.format);
        let options = describe_options(&legal);
        let word = self
            .cursor
            .peek_word()
            .ok_or_else(|| self.cursor.syntax(format!("End of line while looking for {}", options)))?;

        match InstructionKind::from_keyword(&word) {
            Some(kind) if legal.contains(&kind) => {
                if !self.options.permits(kind) {
                    return Err(self.cursor.error(
                        format!("The '{}' instruction is forbidden", kind),
                        ParseErrorKind::Forbidden { instruction: kind },
                    ));
                }
                self.cursor.take_chars(word.chars().count());
                Ok(kind)
            }
            Some(kind) => Err(self.cursor.error(
                format!("Expecting {}, got '{}'", options, word),
                ParseErrorKind::VersionGate {
                    instruction: kind,
                    minimum: kind.minimum_format(),
                },
            )),
            None => Err(self
                .cursor
                .syntax(format!("Expecting {}, got '{}'", options, word))),
        }
    }

    /// `<name> <url>` of a branch-carrying instruction.
    fn parse_branch_head(&mut self) -> Result<BranchNode, ParseError> {
        let name = self.parse_branch_name()?;
        self.cursor.require_whitespace("the branch url")?;
        let url = self.cursor.take_word("the branch url")?;
        Ok(BranchNode::named(&name, &url))
    }

    fn parse_branch_name(&mut self) -> Result<String, ParseError> {
        self.cursor.require_whitespace("the branch id")?;
        let name = self
            .cursor
            .peek_word()
            .ok_or_else(|| self.cursor.syntax("End of line while looking for the branch id"))?;
        if self.seen_names.contains(&name) {
            return Err(self.cursor.error(
                format!("'{}' was already used to identify a branch", name),
                ParseErrorKind::DuplicateName { name },
            ));
        }
        self.cursor.take_chars(name.chars().count());
        self.seen_names.insert(name.clone());
        Ok(name)
    }

    fn parse_optional_word(&mut self) -> Option<String> {
        self.cursor.skip_whitespace();
        let word = self.cursor.peek_word()?;
        self.cursor.take_chars(word.chars().count());
        Some(word)
    }

    fn take_target_dir(
        &mut self,
        root: &BranchNode,
        parent: &[usize],
        looking_for: &str,
    ) -> Result<String, ParseError> {
        let target = self
            .cursor
            .peek_word()
            .ok_or_else(|| self.cursor.syntax(format!("End of line while looking for {}", looking_for)))?;
        self.check_target_free(root, parent, &target)?;
        self.cursor.take_chars(target.chars().count());
        Ok(target)
    }

    fn check_target_free(&self, root: &BranchNode, parent: &[usize], target: &str) -> Result<(), ParseError> {
        let taken = root
            .descendant(parent)
            .map_or(false, |scope| scope.children.iter().any(|c| c.target_dir() == Some(target)));
        if taken {
            return Err(self.cursor.error(
                format!("'{}' already has a branch nested there", target),
                ParseErrorKind::DuplicateTarget {
                    path: target.to_string(),
                },
            ));
        }
        Ok(())
    }

    fn scope_mut<'t>(&self, root: &'t mut BranchNode, path: &[usize]) -> Result<&'t mut BranchNode, ParseError> {
        root.descendant_mut(path)
            .ok_or_else(|| self.cursor.syntax("Instruction outside any branch scope"))
    }
}

/// `nest-part` without a target places the subpath under its own basename.
fn default_target(subpath: &str) -> String {
    subpath
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|base| !base.is_empty())
        .unwrap_or(subpath)
        .to_string()
}
