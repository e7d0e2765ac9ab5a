use std::{io::Write, time::Duration};

use anyhow::{anyhow, bail, Result};

use crate::{
    cli::{Cli, Command},
    domain::{
        chat::Chat,
        message::Message,
        open_chat_state::{OpenChatState, OpenChatUiState},
        resource::Resource,
    },
    store::DocumentStore,
    ui::{
        chat_list::{chat_row, chat_title},
        message_rendering::{build_message_list_elements, render_message_list},
    },
    usecases::{
        bootstrap::{self, Bootstrapped},
        context::{AppContext, SessionContext},
        display_names::NameCache,
        list_chats::{get_or_create_direct_chat, merge_direct_chats},
        load_messages::{get_chat, get_message_history},
        manage_chats::{
            add_participant, create_chat, delete_chat, delete_message, remove_participant, NewChat,
        },
        mark_read::{mark_read, ReadOutcome, ReadReceiptTracker},
        send_message::{compose, deliver, OutgoingMessage},
        subscribe::{subscribe_chats, subscribe_messages, subscribe_project_chats, Subscription},
    },
};

const ROW_WIDTH: usize = 80;
const FIRST_BATCH_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(cli: Cli) -> Result<()> {
    let Bootstrapped {
        context,
        log_guard: _log_guard,
    } = bootstrap::bootstrap(cli.config.as_deref(), cli.store.as_deref())?;

    let session = SessionContext::new(
        cli.user
            .as_deref()
            .unwrap_or(context.config.chat.user_id.as_str()),
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&context, &session, &cli.command, &mut out)?;

    if cli.command.is_mutating() {
        context.persist()?;
    }

    Ok(())
}

pub fn execute(
    context: &AppContext,
    session: &SessionContext,
    command: &Command,
    out: &mut dyn Write,
) -> Result<()> {
    let store = &context.store;

    match command {
        Command::Chats => {
            let user = require_user(session)?;
            let chats = first_batch(subscribe_chats(store, user))?;
            print_chats(store, session, merge_direct_chats(chats, user), out)?;
        }
        Command::ProjectChats { project_id } => {
            let chats = first_batch(subscribe_project_chats(store, project_id))?;
            print_chats(store, session, chats, out)?;
        }
        Command::Messages { chat_id, limit } => {
            let limit = message_limit(context, *limit);
            show_messages(store, session, chat_id, limit, out)?;
        }
        Command::History { chat_id, limit } => {
            let chat = get_chat(store, chat_id)?;
            let mut names = NameCache::new();
            let mut open_chat = open_chat_for(store, session, &chat, &mut names);
            let history = get_message_history(store, &chat.id, message_limit(context, *limit));
            open_chat.apply(history.into());
            print_open_chat(store, session, &open_chat, &mut names, out)?;
        }
        Command::Send {
            chat_id,
            content,
            kind,
            id,
        } => {
            let user = require_user(session)?;
            let mut outgoing = OutgoingMessage {
                kind: (*kind).into(),
                ..OutgoingMessage::text(chat_id, user, content)
            };
            if let Some(id) = id {
                outgoing = outgoing.with_id(id);
            }
            send_and_confirm(store, session, outgoing, message_limit(context, 0), out)?;
        }
        Command::CreateChat {
            kind,
            name,
            project,
            participants,
        } => {
            let user = require_user(session)?;
            let mut members = vec![user.to_owned()];
            members.extend(participants.iter().cloned());
            let chat = create_chat(
                store,
                NewChat {
                    kind: (*kind).into(),
                    name: name.clone(),
                    participants: members,
                    project_id: project.clone(),
                },
            )?;
            writeln!(out, "created {} chat {}", chat.kind.as_str(), chat.id)?;
        }
        Command::Direct { other_user } => {
            let user = require_user(session)?;
            let chat = get_or_create_direct_chat(store, user, other_user)?;
            let mut names = NameCache::new();
            resolve_participants(store, &mut names, std::slice::from_ref(&chat));
            writeln!(out, "{} {}", chat.id, chat_title(&chat, session, &names))?;
        }
        Command::MarkRead {
            chat_id,
            message_id,
        } => {
            let user = require_user(session)?;
            match mark_read(store, message_id, chat_id, user)? {
                ReadOutcome::Marked => writeln!(out, "marked {message_id} read")?,
                ReadOutcome::AlreadyRead => writeln!(out, "{message_id} already read")?,
            }
        }
        Command::DeleteMessage {
            chat_id,
            message_id,
        } => {
            delete_message(store, chat_id, message_id)?;
            writeln!(out, "deleted message {message_id}")?;
        }
        Command::DeleteChat { chat_id } => {
            let removed = delete_chat(store, chat_id)?;
            writeln!(out, "deleted chat {chat_id} and {removed} messages")?;
        }
        Command::Join { chat_id, user_id } => {
            let chat = add_participant(store, chat_id, user_id)?;
            writeln!(out, "participants: {}", chat.participants.join(", "))?;
        }
        Command::Leave { chat_id, user_id } => {
            let chat = remove_participant(store, chat_id, user_id)?;
            writeln!(out, "participants: {}", chat.participants.join(", "))?;
        }
    }

    Ok(())
}

/// Zero on the command line means the configured limit.
fn message_limit(context: &AppContext, requested: usize) -> usize {
    match requested {
        0 => context.config.chat.message_limit,
        value => value,
    }
}

fn require_user(session: &SessionContext) -> Result<&str> {
    match session.user_id() {
        "" => bail!("no acting user: pass --user or set chat.user_id in config"),
        user => Ok(user),
    }
}

/// Waits for the first settled emission of `subscription`, then cancels it.
fn first_batch<T>(subscription: Subscription<T>) -> Result<T> {
    let outcome = loop {
        match subscription.next_timeout(FIRST_BATCH_TIMEOUT) {
            Some(Resource::Loading) => continue,
            Some(Resource::Success(value)) => break Ok(value),
            Some(Resource::Error(message)) => break Err(anyhow!(message)),
            None => break Err(anyhow!("timed out waiting for the store")),
        }
    };
    subscription.cancel();
    outcome
}

fn resolve_participants(store: &dyn DocumentStore, names: &mut NameCache, chats: &[Chat]) {
    for participant in chats.iter().flat_map(|chat| chat.participants.iter()) {
        names.resolve(store, participant);
    }
}

fn print_chats(
    store: &dyn DocumentStore,
    session: &SessionContext,
    chats: Vec<Chat>,
    out: &mut dyn Write,
) -> Result<()> {
    if chats.is_empty() {
        writeln!(out, "No chats yet.")?;
        return Ok(());
    }

    let mut names = NameCache::new();
    resolve_participants(store, &mut names, &chats);
    for chat in &chats {
        writeln!(out, "{}  {}", chat_row(chat, session, &names, ROW_WIDTH), chat.id)?;
    }
    Ok(())
}

fn open_chat_for(
    store: &dyn DocumentStore,
    session: &SessionContext,
    chat: &Chat,
    names: &mut NameCache,
) -> OpenChatState {
    resolve_participants(store, names, std::slice::from_ref(chat));
    let mut open_chat = OpenChatState::default();
    open_chat.set_loading(&chat.id, chat_title(chat, session, names));
    open_chat
}

/// Shows the first batch of the chat's live message stream, then records
/// read receipts for what was shown.
fn show_messages(
    store: &dyn DocumentStore,
    session: &SessionContext,
    chat_id: &str,
    limit: usize,
    out: &mut dyn Write,
) -> Result<()> {
    let chat = get_chat(store, chat_id)?;
    let mut names = NameCache::new();
    let mut open_chat = open_chat_for(store, session, &chat, &mut names);

    let subscription = subscribe_messages(store, &chat.id, limit);
    settle(&subscription, &mut open_chat);
    subscription.cancel();

    let messages = print_open_chat(store, session, &open_chat, &mut names, out)?;

    let marked = ReadReceiptTracker::new(session.clone()).acknowledge(store, &messages);
    if marked > 0 {
        writeln!(out, "({marked} marked read)")?;
    }

    Ok(())
}

/// Feeds `open_chat` until the subscription delivers its first settled batch.
fn settle(subscription: &Subscription<Vec<Message>>, open_chat: &mut OpenChatState) {
    while let Some(emission) = subscription.next_timeout(FIRST_BATCH_TIMEOUT) {
        let settled = !emission.is_loading();
        open_chat.apply(emission);
        if settled {
            break;
        }
    }
}

/// Shows the outgoing message as a pending entry of the open chat, stores it,
/// then waits for the live stream to deliver the stored copy.
fn send_and_confirm(
    store: &dyn DocumentStore,
    session: &SessionContext,
    outgoing: OutgoingMessage,
    limit: usize,
    out: &mut dyn Write,
) -> Result<()> {
    let message = compose(store, outgoing)?;
    let chat = get_chat(store, &message.chat_id)?;
    let mut names = NameCache::new();
    let mut open_chat = open_chat_for(store, session, &chat, &mut names);

    let subscription = subscribe_messages(store, &chat.id, limit);
    settle(&subscription, &mut open_chat);
    open_chat.push_pending(message.clone());

    let pending: Vec<Message> = open_chat
        .messages()
        .into_iter()
        .filter(|shown| shown.id == message.id)
        .collect();
    for line in render_message_list(&build_message_list_elements(&pending, session, &names)) {
        writeln!(out, "{line}")?;
    }

    if let Err(error) = deliver(store, &message) {
        open_chat.discard_pending(&message.id);
        subscription.cancel();
        return Err(error.into());
    }

    while open_chat.pending_count() > 0 {
        match subscription.next_timeout(FIRST_BATCH_TIMEOUT) {
            Some(Resource::Error(reason)) => {
                tracing::warn!(chat_id = %chat.id, error = %reason, "stream failed after send");
                break;
            }
            Some(emission) => open_chat.apply(emission),
            None => break,
        }
    }
    subscription.cancel();

    if open_chat.pending_count() == 0 {
        writeln!(out, "sent {} to {}", message.id, message.chat_id)?;
    } else {
        writeln!(out, "sent {} to {} (not yet confirmed)", message.id, message.chat_id)?;
    }
    Ok(())
}

fn print_open_chat(
    store: &dyn DocumentStore,
    session: &SessionContext,
    open_chat: &OpenChatState,
    names: &mut NameCache,
    out: &mut dyn Write,
) -> Result<Vec<Message>> {
    match open_chat.ui_state() {
        OpenChatUiState::Ready => {}
        OpenChatUiState::Error => bail!(
            "failed to load messages: {}",
            open_chat.last_error().unwrap_or("unknown error")
        ),
        OpenChatUiState::Empty | OpenChatUiState::Loading => {
            bail!("timed out waiting for messages")
        }
    }

    let messages = open_chat.messages();
    writeln!(out, "# {}", open_chat.chat_title())?;
    if messages.is_empty() {
        writeln!(out, "No messages yet.")?;
        return Ok(messages);
    }

    names.remember_senders(&messages);
    for message in &messages {
        names.resolve(store, &message.sender_id);
    }
    for line in render_message_list(&build_message_list_elements(&messages, session, names)) {
        writeln!(out, "{line}")?;
    }

    Ok(messages)
}
