use serde::Serialize;

use helpbot_core::domain::review::{
    Review, ReviewWindow, CHECK_MODULES_MAX_LEN, DESCRIPTION_LEN, IMAGE_URL_MAX_LEN,
    REPOSITORY_URL_LEN,
};
use helpbot_core::domain::user::UserId;
use helpbot_core::errors::InterfaceError;
use helpbot_core::reputation::ReputationChange;
use helpbot_workflows::Standing;

use crate::events::ChannelId;

pub const SIGNUP_ADD_BUTTON: &str = "review.signup.add.v1";
pub const SIGNUP_CANCEL_BUTTON: &str = "review.signup.cancel.v1";
pub const SIGNUP_FORM: &str = "review.signup.form.v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Markdown { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Markdown { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Success,
    Danger,
    Link,
}

/// A component button. Link buttons carry a `url` instead of a `custom_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl ButtonElement {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            custom_id: Some(custom_id.into()),
            url: None,
            label: label.into(),
            style: None,
            emoji: None,
        }
    }

    pub fn link(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            custom_id: None,
            url: Some(url.into()),
            label: label.into(),
            style: Some(ButtonStyle::Link),
            emoji: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub field_id: String,
    pub label: String,
    pub placeholder: String,
    pub min_length: usize,
    pub max_length: usize,
    pub required: bool,
    pub multiline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
    Form { block_id: String, title: String, fields: Vec<FormField> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
    /// Visible only to the member who triggered the interaction.
    pub ephemeral: bool,
}

impl MessageTemplate {
    pub fn button(&self, custom_id: &str) -> Option<&ButtonElement> {
        self.blocks.iter().find_map(|block| match block {
            Block::Actions { elements, .. } => {
                elements.iter().find(|button| button.custom_id.as_deref() == Some(custom_id))
            }
            _ => None,
        })
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
    ephemeral: bool,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new(), ephemeral: false }
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn form(mut self, block_id: impl Into<String>, title: impl Into<String>, fields: Vec<FormField>) -> Self {
        self.blocks.push(Block::Form { block_id: block_id.into(), title: title.into(), fields });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            fallback_text: self.fallback_text,
            blocks: self.blocks,
            ephemeral: self.ephemeral,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn markdown(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::markdown(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn markdown(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::markdown(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

fn mention(user: UserId) -> String {
    format!("<@{user}>")
}

fn ephemeral_notice(block_id: &str, text: &str) -> MessageTemplate {
    MessageBuilder::new(text.to_owned())
        .ephemeral()
        .section(block_id.to_owned(), |section| {
            section.plain(text.to_owned());
        })
        .build()
}

pub fn post_created_message(mark_solution_command: &str) -> MessageTemplate {
    MessageBuilder::new("Post created!")
        .section("ticket.created.summary.v1", |section| {
            section.markdown(format!(
                "**Post created!**\nSomeone will answer soon, please bear with us.\n\
                 📝 Mark an answer as the solution with right click on the message -> \
                 \"Apps\" -> \"{mark_solution_command}\""
            ));
        })
        .build()
}

/// Confirmation for a marked solution. Self-resolution links back to the answer.
pub fn solution_marked_message(
    resolver: UserId,
    self_resolved: bool,
    jump_url: &str,
    reputation: Option<&ReputationChange>,
) -> MessageTemplate {
    if self_resolved {
        return MessageBuilder::new("You marked your own answer as the solution")
            .section("ticket.solution.self.v1", |section| {
                section.markdown("✅ **Done**\nYou marked your own answer as the solution.");
            })
            .actions("ticket.solution.jump.v1", |actions| {
                actions.button(ButtonElement::link(jump_url, "Jump to answer"));
            })
            .build();
    }

    let mut builder = MessageBuilder::new("Marked as the solution").section(
        "ticket.solution.accepted.v1",
        |section| {
            section.markdown(format!("✅ Marked {}'s answer as the solution.", mention(resolver)));
        },
    );
    if let Some(change) = reputation {
        builder = builder.context("ticket.solution.reputation.v1", |context| {
            context.plain(format!("Reputation: {} (level {})", change.reputation, change.new_level));
        });
    }
    builder.build()
}

pub fn level_up_message(user: UserId, new_level: u32) -> MessageTemplate {
    MessageBuilder::new(format!("Level up: {new_level}"))
        .section("reputation.level_up.v1", |section| {
            section.markdown(format!(
                "🎉 {} reached helper level **{new_level}**. Thanks for helping out!",
                mention(user)
            ));
        })
        .build()
}

pub fn subscriber_thanks_message(
    user: UserId,
    subscription_level: u32,
    help_forum: ChannelId,
) -> MessageTemplate {
    MessageBuilder::new(format!("{} subscribed at level {subscription_level}", mention(user)))
        .section("members.subscriber.thanks.v1", |section| {
            section.markdown(format!(
                "{} supported the author!\n❤️ Thank you for activating a level \
                 **{subscription_level}** subscription.\n\nYou can now:\n\
                 1. Create priority questions in <#{help_forum}>",
                mention(user)
            ));
        })
        .build()
}

pub fn subscriber_owner_notice(user: UserId, subscription_level: u32) -> MessageTemplate {
    MessageBuilder::new(format!(
        "{} started a level {subscription_level} subscription",
        mention(user)
    ))
    .section("members.subscriber.owner.v1", |section| {
        section.markdown(format!(
            "**{}** started a level **{subscription_level}** subscription.",
            mention(user)
        ));
    })
    .build()
}

pub fn welcome_message(user: UserId) -> MessageTemplate {
    MessageBuilder::new(format!("Welcome {}", mention(user)))
        .section("members.welcome.v1", |section| {
            section.markdown(format!("👋 Welcome to the server, {}!", mention(user)));
        })
        .build()
}

pub fn signup_announcement_message(window: &ReviewWindow) -> MessageTemplate {
    let closes = window.closed_at.timestamp();
    MessageBuilder::new("Code review signups are open")
        .section("review.announcement.summary.v1", |section| {
            section.markdown(
                "# Code review signups are open!\n\
                 I will review the quality of your bot code, look at its features and \
                 share comments and advice. The whole event is streamed.\n\
                 ## Requirements:\n\
                 1. The code is published in a **public** GitHub repository\n\
                 2. The bot is **running** on your server at review time\n\
                 3. **All** sensitive data is removed from the code *(tokens, passwords, addresses)*\n\
                 4. Prepare a **description** of the bot (what it does, how to use it)\n\
                 5. Ideally, attach an image of the bot architecture\n\
                 6. The code is **at most 550-650 lines**; otherwise list the modules to check",
            );
        })
        .context("review.announcement.deadline.v1", |context| {
            context.markdown(format!("⭕ Signups close <t:{closes}:R>"));
        })
        .actions("review.announcement.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(SIGNUP_ADD_BUTTON, "Sign up")
                        .style(ButtonStyle::Success)
                        .emoji("📃"),
                )
                .button(
                    ButtonElement::new(SIGNUP_CANCEL_BUTTON, "Cancel signup")
                        .style(ButtonStyle::Danger)
                        .emoji("✖️"),
                );
        })
        .build()
}

pub fn collection_closed_message(participants: &[UserId]) -> MessageTemplate {
    if participants.is_empty() {
        return MessageBuilder::new("Code review cancelled")
            .section("review.closed.empty.v1", |section| {
                section.plain("The code review is cancelled because nobody signed up. 😢");
            })
            .build();
    }

    let list = participants.iter().map(|user| mention(*user)).collect::<Vec<_>>().join("\n");
    MessageBuilder::new(format!("Code review signups closed with {} participants", participants.len()))
        .section("review.closed.participants.v1", |section| {
            section.markdown(format!(
                "## Code review signups are closed!\n📃 Participants:\n{list}\n\
                 The stream start time will be announced in this channel."
            ));
        })
        .build()
}

/// The signup modal, with the same limits the form validation enforces.
pub fn signup_form() -> MessageTemplate {
    let fields = vec![
        FormField {
            field_id: "repository_url".to_owned(),
            label: "Bot repository link".to_owned(),
            placeholder: "https://github.com/.../...".to_owned(),
            min_length: REPOSITORY_URL_LEN.0,
            max_length: REPOSITORY_URL_LEN.1,
            required: true,
            multiline: false,
        },
        FormField {
            field_id: "description".to_owned(),
            label: "Description".to_owned(),
            placeholder: "What the bot does and how to use it".to_owned(),
            min_length: DESCRIPTION_LEN.0,
            max_length: DESCRIPTION_LEN.1,
            required: true,
            multiline: true,
        },
        FormField {
            field_id: "check_modules".to_owned(),
            label: "Does the bot fit in 550-650 lines?".to_owned(),
            placeholder: "If not, list the modules to review".to_owned(),
            min_length: 0,
            max_length: CHECK_MODULES_MAX_LEN,
            required: true,
            multiline: false,
        },
        FormField {
            field_id: "architecture_image_url".to_owned(),
            label: "Architecture image link (optional)".to_owned(),
            placeholder: "https://imgur.com/".to_owned(),
            min_length: 0,
            max_length: IMAGE_URL_MAX_LEN,
            required: false,
            multiline: false,
        },
    ];

    MessageBuilder::new("Code review signup").ephemeral().form(SIGNUP_FORM, "Code review signup", fields).build()
}

pub fn signup_confirmed_message() -> MessageTemplate {
    ephemeral_notice("review.signup.confirmed.v1", "You are signed up for the code review!")
}

pub fn signup_cancelled_message() -> MessageTemplate {
    ephemeral_notice("review.signup.cancelled.v1", "Your signup was cancelled.")
}

pub fn signup_not_present_message() -> MessageTemplate {
    ephemeral_notice("review.signup.not_present.v1", "You have not signed up for this code review.")
}

pub fn signup_already_present_message() -> MessageTemplate {
    ephemeral_notice("review.signup.duplicate.v1", "You already signed up for this code review.")
}

pub fn signups_closed_message() -> MessageTemplate {
    ephemeral_notice("review.signup.closed.v1", "Code review signups are closed.")
}

pub fn review_launched_message(review: &Review) -> MessageTemplate {
    ephemeral_notice(
        "review.launch.confirmed.v1",
        &format!("Code review {} launched, signups close at {}.", review.id, review.closed_at.to_rfc3339()),
    )
}

pub fn reputation_message(standing: &Standing) -> MessageTemplate {
    let user = &standing.user;
    let next = match standing.remaining_to_next_level {
        Some(remaining) => format!("{remaining} points to the next level"),
        None => "max level reached".to_owned(),
    };
    MessageBuilder::new(format!("Reputation of {}: {}", mention(user.id), user.reputation))
        .ephemeral()
        .section("reputation.show.summary.v1", |section| {
            section.markdown(format!(
                "**Reputation of {}**\nReputation: {}\nLevel: {}\nResolved questions: {}",
                mention(user.id),
                user.reputation,
                user.level,
                user.resolved_questions
            ));
        })
        .context("reputation.show.next.v1", |context| {
            context.plain(next);
        })
        .build()
}

pub fn reputation_set_message(user: UserId, change: &ReputationChange) -> MessageTemplate {
    ephemeral_notice(
        "reputation.set.confirmed.v1",
        &format!(
            "Reputation of {} set to {} (level {}).",
            mention(user),
            change.reputation,
            change.new_level
        ),
    )
}

pub fn ticket_renamed_message(invoker: UserId) -> MessageTemplate {
    MessageBuilder::new("Question renamed")
        .section("ticket.moderation.renamed.v1", |section| {
            section.markdown(format!("{} renamed the question.", mention(invoker)));
        })
        .build()
}

pub fn ticket_archived_message() -> MessageTemplate {
    MessageBuilder::new("Question closed")
        .section("ticket.moderation.archived.v1", |section| {
            section.plain("Question closed.");
        })
        .build()
}

pub fn ticket_unarchived_message() -> MessageTemplate {
    MessageBuilder::new("Question reopened")
        .section("ticket.moderation.unarchived.v1", |section| {
            section.plain("Question reopened.");
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .ephemeral()
        .section("error.summary.v1", |section| {
            section.markdown(format!("❌ {summary}"));
        })
        .context("error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn interface_error_message(error: &InterfaceError) -> MessageTemplate {
    error_message(error.user_message(), error.correlation_id())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use helpbot_core::domain::review::{ReviewWindow, DESCRIPTION_LEN};
    use helpbot_core::domain::user::UserId;
    use helpbot_core::errors::InterfaceError;

    use super::{
        collection_closed_message, interface_error_message, signup_announcement_message,
        signup_form, solution_marked_message, Block, ButtonStyle, MessageBuilder, TextObject,
        SIGNUP_ADD_BUTTON, SIGNUP_CANCEL_BUTTON,
    };

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("review.summary.v1", |section| {
                section.markdown("**Summary**");
            })
            .actions("review.summary.actions.v1", |actions| {
                actions.button(super::ButtonElement::new("review.confirm.v1", "Confirm"));
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(!message.ephemeral);
        assert!(matches!(
            &message.blocks[0],
            Block::Section { block_id, text: TextObject::Markdown { .. } }
                if block_id == "review.summary.v1"
        ));
        assert!(matches!(
            &message.blocks[1],
            Block::Actions { block_id, elements }
                if block_id == "review.summary.actions.v1" && elements.len() == 1
        ));
    }

    #[test]
    fn announcement_carries_signup_and_cancel_buttons() {
        let started_at = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let window = ReviewWindow { started_at, closed_at: started_at + chrono::Duration::days(2) };
        let message = signup_announcement_message(&window);

        let add = message.button(SIGNUP_ADD_BUTTON).expect("signup button");
        assert_eq!(add.style, Some(ButtonStyle::Success));
        let cancel = message.button(SIGNUP_CANCEL_BUTTON).expect("cancel button");
        assert_eq!(cancel.style, Some(ButtonStyle::Danger));

        let deadline = window.closed_at.timestamp().to_string();
        assert!(message.blocks.iter().any(|block| matches!(
            block,
            Block::Context { elements, .. }
                if matches!(elements.first(), Some(TextObject::Markdown { text }) if text.contains(&deadline))
        )));
    }

    #[test]
    fn close_report_lists_participants_or_cancels() {
        let report = collection_closed_message(&[UserId(11), UserId(12)]);
        assert!(matches!(
            &report.blocks[0],
            Block::Section { text: TextObject::Markdown { text }, .. }
                if text.contains("<@11>\n<@12>")
        ));

        let cancelled = collection_closed_message(&[]);
        assert_eq!(cancelled.fallback_text, "Code review cancelled");
    }

    #[test]
    fn self_resolution_links_back_to_the_answer() {
        let url = "https://discord.com/channels/1/2/3";
        let message = solution_marked_message(UserId(4), true, url, None);
        assert!(message.blocks.iter().any(|block| matches!(
            block,
            Block::Actions { elements, .. }
                if elements[0].url.as_deref() == Some(url) && elements[0].style == Some(ButtonStyle::Link)
        )));

        let helped = solution_marked_message(UserId(4), false, url, None);
        assert!(helped.blocks.iter().all(|block| !matches!(block, Block::Actions { .. })));
    }

    #[test]
    fn signup_form_mirrors_validation_limits() {
        let form = signup_form();
        assert!(form.ephemeral);
        let Block::Form { fields, .. } = &form.blocks[0] else {
            panic!("expected a form block");
        };
        assert_eq!(fields.len(), 4);
        assert_eq!((fields[1].min_length, fields[1].max_length), DESCRIPTION_LEN);
        assert!(!fields[3].required);
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let error = InterfaceError::ServiceUnavailable {
            message: "database is locked".to_owned(),
            correlation_id: "evt-123".to_owned(),
        };
        let message = interface_error_message(&error);
        assert!(message.ephemeral);
        assert!(!message.fallback_text.contains("locked"));
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. }
                if matches!(elements.first(), Some(TextObject::Plain { text }) if text.contains("evt-123"))
        ));
    }
}
