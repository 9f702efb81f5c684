//! New-process prompt
//!
//! A small two-field form (program and arguments) shown over the console.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Which field has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptField {
    File,
    Arguments,
}

/// What the prompt did with a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Pending,
    Cancelled,
    Submit { file: String, arguments: String },
}

#[derive(Debug, Clone)]
pub struct NewProcessPrompt {
    pub file: String,
    pub arguments: String,
    pub focus: PromptField,
}

impl NewProcessPrompt {
    /// Open the prompt, pre-filled with the last program run
    pub fn new(file: Option<String>, arguments: Option<String>) -> Self {
        Self {
            file: file.unwrap_or_default(),
            arguments: arguments.unwrap_or_default(),
            focus: PromptField::File,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            PromptField::File => &mut self.file,
            PromptField::Arguments => &mut self.arguments,
        }
    }

    /// Insert pasted text into the focused field (newlines dropped)
    pub fn paste(&mut self, text: &str) {
        let clean: String = text.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        self.field_mut().push_str(&clean);
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> PromptOutcome {
        match event.code {
            KeyCode::Esc => PromptOutcome::Cancelled,
            KeyCode::Enter => {
                let file = self.file.trim();
                if file.is_empty() {
                    self.focus = PromptField::File;
                    return PromptOutcome::Pending;
                }
                PromptOutcome::Submit {
                    file: file.to_string(),
                    arguments: self.arguments.trim().to_string(),
                }
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.focus = match self.focus {
                    PromptField::File => PromptField::Arguments,
                    PromptField::Arguments => PromptField::File,
                };
                PromptOutcome::Pending
            }
            KeyCode::Backspace => {
                self.field_mut().pop();
                PromptOutcome::Pending
            }
            KeyCode::Char(ch)
                if !event.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.field_mut().push(ch);
                PromptOutcome::Pending
            }
            _ => PromptOutcome::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(prompt: &mut NewProcessPrompt, code: KeyCode) -> PromptOutcome {
        prompt.handle_key(&KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(prompt: &mut NewProcessPrompt, text: &str) {
        for ch in text.chars() {
            press(prompt, KeyCode::Char(ch));
        }
    }

    #[test]
    fn test_fill_both_fields_and_submit() {
        let mut prompt = NewProcessPrompt::new(None, None);
        type_str(&mut prompt, "ping");
        press(&mut prompt, KeyCode::Tab);
        type_str(&mut prompt, "-c 1 localhost");

        assert_eq!(
            press(&mut prompt, KeyCode::Enter),
            PromptOutcome::Submit {
                file: "ping".to_string(),
                arguments: "-c 1 localhost".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_program_is_not_submitted() {
        let mut prompt = NewProcessPrompt::new(None, Some("x".to_string()));
        prompt.focus = PromptField::Arguments;
        assert_eq!(press(&mut prompt, KeyCode::Enter), PromptOutcome::Pending);
        assert_eq!(prompt.focus, PromptField::File);
    }

    #[test]
    fn test_escape_cancels() {
        let mut prompt = NewProcessPrompt::new(Some("cmd.exe".to_string()), None);
        assert_eq!(press(&mut prompt, KeyCode::Esc), PromptOutcome::Cancelled);
    }

    #[test]
    fn test_backspace_and_paste() {
        let mut prompt = NewProcessPrompt::new(Some("lss".to_string()), None);
        press(&mut prompt, KeyCode::Backspace);
        assert_eq!(prompt.file, "ls");

        press(&mut prompt, KeyCode::Tab);
        prompt.paste("-la\r\n");
        assert_eq!(prompt.arguments, "-la");
    }
}
