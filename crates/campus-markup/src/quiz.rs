//! Flattening of the legacy compound quiz (`Quiz.Card`, `Quiz.MultipleChoice`, ...)
//! into the flat quiz vocabulary.

use campus_core::MigrationError;

use crate::ast::{expression_string_list, AttrValue, Element, Node};
use crate::rewrite::Visit;

const NEW_QUIZ_CHILDREN: &[&str] = &["QuizChoice", "QuizTextInput"];

pub(crate) fn flatten_quiz(quiz: &Element, entry: &str) -> Result<Visit, MigrationError> {
    let has_cards = quiz.children.iter().any(|child| child.is_element_named("Quiz.Card"));
    if !has_cards {
        let already_flat = !quiz.children.is_empty()
            && quiz.children.iter().all(|child| {
                child
                    .as_element()
                    .is_some_and(|el| NEW_QUIZ_CHILDREN.contains(&el.name.as_str()))
            });
        if already_flat {
            return Ok(Visit::Keep);
        }
        return Err(unexpected("Quiz", entry, "quiz has no <Quiz.Card> children"));
    }

    let mut blocks = Vec::new();
    for child in &quiz.children {
        match child {
            Node::Element(card) if card.name == "Quiz.Card" => {
                blocks.push(Node::Element(flatten_card(card, entry)?));
            }
            Node::Element(other) => {
                return Err(unexpected(&other.name, entry, "expected <Quiz.Card> inside <Quiz>"))
            }
            _ => return Err(unexpected("Quiz", entry, "stray prose between quiz cards")),
        }
    }

    let mut flat = Element::new("Quiz", quiz.flow).with_children(blocks);
    flat.attributes = quiz.attributes.clone();
    Ok(Visit::Replace(Node::Element(flat)))
}

fn flatten_card(card: &Element, entry: &str) -> Result<Element, MigrationError> {
    let mut block: Option<&Element> = None;
    let mut question: Option<&Element> = None;
    let mut messages = Vec::new();

    for child in &card.children {
        let Node::Element(el) = child else {
            return Err(unexpected("Quiz.Card", entry, "stray prose inside a quiz card"));
        };
        match el.name.as_str() {
            "Quiz.MultipleChoice" | "Quiz.TextInput" => {
                if block.replace(el).is_some() {
                    return Err(unexpected(&el.name, entry, "a quiz card holds a single question block"));
                }
            }
            "Quiz.Question" => {
                if question.replace(el).is_some() {
                    return Err(unexpected(&el.name, entry, "more than one question in a quiz card"));
                }
            }
            "Quiz.Message" => messages.push(message(el, entry)?),
            _ => return Err(unexpected(&el.name, entry, "not allowed inside <Quiz.Card>")),
        }
    }

    let block = block.ok_or_else(|| {
        unexpected(
            "Quiz.Card",
            entry,
            "card has neither <Quiz.MultipleChoice> nor <Quiz.TextInput>",
        )
    })?;

    if block.name == "Quiz.MultipleChoice" {
        multiple_choice(block, question, messages, entry)
    } else {
        text_input(block, question, messages, entry)
    }
}

fn multiple_choice(
    block: &Element,
    card_question: Option<&Element>,
    card_messages: Vec<Node>,
    entry: &str,
) -> Result<Element, MigrationError> {
    let mut question = card_question;
    let mut options = Vec::new();
    let mut messages = Vec::new();

    for child in &block.children {
        let Node::Element(el) = child else {
            return Err(unexpected(&block.name, entry, "stray prose inside a multiple-choice block"));
        };
        match el.name.as_str() {
            "Quiz.Question" => {
                if question.replace(el).is_some() {
                    return Err(unexpected(&el.name, entry, "more than one question in a quiz card"));
                }
            }
            "Quiz.MultipleChoice.Option" => options.push(el),
            "Quiz.Message" => messages.push(message(el, entry)?),
            _ => return Err(unexpected(&el.name, entry, "not allowed inside <Quiz.MultipleChoice>")),
        }
    }

    let question = question.ok_or_else(|| unexpected(&block.name, entry, "missing <Quiz.Question>"))?;
    if options.is_empty() {
        return Err(unexpected(&block.name, entry, "multiple choice without options"));
    }

    let correct = options.iter().filter(|option| option.flag("isCorrect")).count();
    let variant = match block.literal("variant") {
        Some(variant) if variant == "single" || variant == "multiple" => variant,
        Some(other) => {
            return Err(MigrationError::invalid_enum(
                "Quiz.MultipleChoice variant",
                &other,
                &["single", "multiple"],
            ))
        }
        None if correct > 1 => "multiple".to_string(),
        None => "single".to_string(),
    };

    let mut choice = Element::flow("QuizChoice").with_literal("variant", variant);
    if let Some(label) = block.attr("buttonLabel") {
        choice.set_attr("buttonLabel", label.clone());
    }

    let mut children = vec![Node::Element(
        Element::new("QuizChoiceQuestion", question.flow).with_children(question.children.clone()),
    )];
    children.extend(options.iter().map(|option| {
        let kind = if option.flag("isCorrect") { "correct" } else { "incorrect" };
        Node::Element(
            Element::new("QuizChoiceAnswer", option.flow)
                .with_literal("kind", kind)
                .with_children(option.children.clone()),
        )
    }));
    children.extend(messages);
    children.extend(card_messages);

    Ok(choice.with_children(children))
}

fn text_input(
    block: &Element,
    card_question: Option<&Element>,
    card_messages: Vec<Node>,
    entry: &str,
) -> Result<Element, MigrationError> {
    let mut question = card_question;
    let mut messages = Vec::new();

    for child in &block.children {
        let Node::Element(el) = child else {
            return Err(unexpected(&block.name, entry, "stray prose inside a text-input block"));
        };
        match el.name.as_str() {
            "Quiz.Question" => {
                if question.replace(el).is_some() {
                    return Err(unexpected(&el.name, entry, "more than one question in a quiz card"));
                }
            }
            "Quiz.Message" => messages.push(message(el, entry)?),
            _ => return Err(unexpected(&el.name, entry, "not allowed inside <Quiz.TextInput>")),
        }
    }

    let question = question.ok_or_else(|| unexpected(&block.name, entry, "missing <Quiz.Question>"))?;
    let solutions = match block.attr("solution") {
        Some(AttrValue::Literal(value)) => vec![value.clone()],
        Some(AttrValue::Expression(expr)) => expression_string_list(expr)
            .or_else(|| block.literal("solution").map(|value| vec![value]))
            .ok_or_else(|| unexpected(&block.name, entry, "`solution` must be a string or a list of strings"))?,
        _ => Vec::new(),
    };
    if solutions.is_empty() {
        return Err(unexpected(&block.name, entry, "text input without a solution"));
    }

    let mut children = vec![Node::Element(
        Element::new("QuizTextInputQuestion", question.flow).with_children(question.children.clone()),
    )];
    children.extend(solutions.into_iter().map(|solution| {
        Node::Element(
            Element::flow("QuizTextInputAnswer")
                .with_literal("kind", "correct")
                .with_children(vec![Node::Markdown(solution)]),
        )
    }));
    children.extend(messages);
    children.extend(card_messages);

    Ok(Element::flow("QuizTextInput").with_children(children))
}

fn message(el: &Element, entry: &str) -> Result<Node, MigrationError> {
    let kind = el
        .literal("type")
        .ok_or_else(|| unexpected(&el.name, entry, "message without a `type`"))?;
    let name = match kind.as_str() {
        "correct" | "success" => "QuizSuccessMessage",
        "incorrect" | "error" => "QuizErrorMessage",
        other => {
            return Err(MigrationError::invalid_enum(
                "Quiz.Message type",
                other,
                &["correct", "incorrect", "success", "error"],
            ))
        }
    };
    Ok(Node::Element(
        Element::new(name, el.flow).with_children(el.children.clone()),
    ))
}

fn unexpected(tag: &str, entry: &str, reason: &str) -> MigrationError {
    MigrationError::unexpected_markup(tag, entry, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn flatten(src: &str) -> Result<Visit, MigrationError> {
        let nodes = parse(src).unwrap();
        flatten_quiz(nodes[0].as_element().unwrap(), "posts/quiz")
    }

    fn names(el: &Element) -> Vec<&str> {
        el.child_elements().map(|child| child.name.as_str()).collect()
    }

    #[test]
    fn single_choice_card_flattens_in_order() {
        let src = r#"<Quiz>
  <Quiz.Card>
    <Quiz.MultipleChoice>
      <Quiz.Question>Which format is XML based?</Quiz.Question>
      <Quiz.MultipleChoice.Option isCorrect>TEI</Quiz.MultipleChoice.Option>
      <Quiz.MultipleChoice.Option>CSV</Quiz.MultipleChoice.Option>
      <Quiz.Message type="correct">Right.</Quiz.Message>
    </Quiz.MultipleChoice>
  </Quiz.Card>
</Quiz>"#;
        let Visit::Replace(Node::Element(quiz)) = flatten(src).unwrap() else {
            panic!("expected a replacement");
        };
        assert_eq!(names(&quiz), vec!["QuizChoice"]);
        let choice = quiz.child_elements().next().unwrap();
        assert_eq!(choice.literal("variant").as_deref(), Some("single"));
        assert_eq!(
            names(choice),
            vec!["QuizChoiceQuestion", "QuizChoiceAnswer", "QuizChoiceAnswer", "QuizSuccessMessage"]
        );
        let kinds: Vec<_> = choice
            .child_elements()
            .filter_map(|child| child.literal("kind"))
            .collect();
        assert_eq!(kinds, vec!["correct", "incorrect"]);
    }

    #[test]
    fn several_correct_options_mean_multiple() {
        let src = r#"<Quiz>
  <Quiz.Card>
    <Quiz.Question>Pick the markup languages.</Quiz.Question>
    <Quiz.MultipleChoice buttonLabel="Check">
      <Quiz.MultipleChoice.Option isCorrect>XML</Quiz.MultipleChoice.Option>
      <Quiz.MultipleChoice.Option isCorrect={true}>HTML</Quiz.MultipleChoice.Option>
    </Quiz.MultipleChoice>
    <Quiz.Message type="incorrect">Not quite.</Quiz.Message>
  </Quiz.Card>
</Quiz>"#;
        let Visit::Replace(Node::Element(quiz)) = flatten(src).unwrap() else {
            panic!("expected a replacement");
        };
        let choice = quiz.child_elements().next().unwrap();
        assert_eq!(choice.literal("variant").as_deref(), Some("multiple"));
        assert_eq!(choice.literal("buttonLabel").as_deref(), Some("Check"));
        assert_eq!(names(choice).last(), Some(&"QuizErrorMessage"));
    }

    #[test]
    fn text_input_answers_come_from_the_solution() {
        let src = r#"<Quiz>
  <Quiz.Card>
    <Quiz.TextInput solution={["TEI", "tei"]}>
      <Quiz.Question>Name the standard.</Quiz.Question>
    </Quiz.TextInput>
  </Quiz.Card>
</Quiz>"#;
        let Visit::Replace(Node::Element(quiz)) = flatten(src).unwrap() else {
            panic!("expected a replacement");
        };
        let input = quiz.child_elements().next().unwrap();
        assert_eq!(input.name, "QuizTextInput");
        assert_eq!(
            names(input),
            vec!["QuizTextInputQuestion", "QuizTextInputAnswer", "QuizTextInputAnswer"]
        );
    }

    #[test]
    fn flat_quizzes_are_left_alone() {
        let src = "<Quiz>\n\t<QuizChoice variant=\"single\">\n\t\t<QuizChoiceQuestion>Q</QuizChoiceQuestion>\n\t</QuizChoice>\n</Quiz>";
        assert_eq!(flatten(src).unwrap(), Visit::Keep);
    }

    #[test]
    fn malformed_quizzes_are_rejected() {
        let missing_block = "<Quiz>\n<Quiz.Card>\n<Quiz.Question>Q</Quiz.Question>\n</Quiz.Card>\n</Quiz>";
        assert!(matches!(
            flatten(missing_block),
            Err(MigrationError::UnexpectedMarkup { .. })
        ));

        let bad_message = "<Quiz>\n<Quiz.Card>\n<Quiz.TextInput solution=\"x\">\n<Quiz.Question>Q</Quiz.Question>\n<Quiz.Message type=\"maybe\">?</Quiz.Message>\n</Quiz.TextInput>\n</Quiz.Card>\n</Quiz>";
        assert!(matches!(
            flatten(bad_message),
            Err(MigrationError::InvalidEnumValue { .. })
        ));
    }
}
