//! Canonical move-text encoder.
//!
//! Openings are matched against games by plain text containment, so the
//! catalogue's lines and the games' move text must be rendered identically.
//! Everything that touches move text for matching goes through
//! [`canonicalize`].
//!
//! The encoder is lexical: it strips commentary and decoration, it never
//! validates moves.
//!
//! Canonical form: `1. e4 e5 2. Nf3 Nc6`. Move numbers appear only before
//! White's move, tokens are separated by single spaces, and there are no
//! comments, variations, NAGs, annotation glyphs or result markers.

const RESULTS: [&str; 5] = ["1-0", "0-1", "1/2-1/2", "½-½", "*"];

/// Render `movetext` in canonical form. Idempotent.
pub fn canonicalize(movetext: &str) -> String {
  let stripped = strip_commentary(movetext);
  let mut out = String::with_capacity(stripped.len());
  for token in stripped.split_whitespace() {
    push_token(&mut out, token);
  }
  out
}

/// Remove `{...}` and `;` comments and `(...)` variations (nested). Each
/// removed span is replaced by a space so neighbouring tokens stay apart.
fn strip_commentary(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut depth = 0usize;
  let mut chars = s.chars();

  while let Some(c) = chars.next() {
    match c {
      '{' => {
        for c in chars.by_ref() {
          if c == '}' {
            break;
          }
        }
        out.push(' ');
      }
      ';' => {
        for c in chars.by_ref() {
          if c == '\n' {
            break;
          }
        }
        out.push(' ');
      }
      '(' => {
        depth += 1;
        out.push(' ');
      }
      ')' => {
        depth = depth.saturating_sub(1);
        out.push(' ');
      }
      _ if depth > 0 => {}
      c => out.push(c),
    }
  }
  out
}

fn push_token(out: &mut String, token: &str) {
  if token.starts_with('$') || RESULTS.contains(&token) {
    return;
  }

  // Split a leading move number: `12.` is kept, `12...` (Black to move) is
  // dropped, and anything glued on after the dots is the move itself.
  let digits = token.bytes().take_while(u8::is_ascii_digit).count();
  let dots = token[digits..].bytes().take_while(|&b| b == b'.').count();
  let mut mv = token;
  if digits > 0 && dots > 0 {
    if dots == 1 {
      push_word(out, &token[..=digits]);
    }
    mv = &token[digits + dots..];
  }

  let mv = mv.trim_end_matches(['!', '?']);
  let mv = match mv {
    "" => return,
    "0-0" => "O-O",
    "0-0-0" => "O-O-O",
    other => other,
  };
  push_word(out, mv);
}

fn push_word(out: &mut String, word: &str) {
  if !out.is_empty() {
    out.push(' ');
  }
  out.push_str(word);
}
