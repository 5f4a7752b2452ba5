use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use movie_quiz::quiz::movies::MovieQuestions;
use movie_quiz::quiz::parts::PartsSentences;
use movie_quiz::quiz::stress::StressWords;
use movie_quiz::{
    build_summary, Config, JsonFileStatistics, MemoryStatistics, Question, QuestionSource,
    RoundEngine, RoundError, RoundObserver, RoundRecord, RoundStatistics, StatisticsStore, Summary,
};
use teloxide::{
    prelude::*,
    types::{InputFile, KeyboardButton, KeyboardMarkup},
};
use tokio::sync::{mpsc, Mutex};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const MOVIES_TOPIC: &str = "Фільми";
const STRESS_TOPIC: &str = "Наголоси";
const PARTS_TOPIC: &str = "Частини мови";
const YES: &str = "Так";
const NO: &str = "Ні";
const PLAY_AGAIN: &str = "Зіграти ще раз";
const CHANGE_TOPIC: &str = "Змінити тему";

const GREETING_TEXT: &str = "Привіт! Я -- квіз-бот. Відповідай \"Так\" або \"Ні\" на питання, а я рахуватиму твої результати. Обери тему!";

struct Topics {
    movies: Arc<MovieQuestions>,
    stress: Option<Arc<StressWords>>,
    parts: Option<Arc<PartsSentences>>,
}

impl Topics {
    fn load(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let movies = Arc::new(MovieQuestions::load(&config.movies_path)?);
        let stress = match &config.stress_path {
            Some(path) => Some(Arc::new(StressWords::load(path)?)),
            None => None,
        };
        let parts = match &config.conllu_path {
            Some(path) => Some(Arc::new(PartsSentences::load(path)?)),
            None => None,
        };
        Ok(Self {
            movies,
            stress,
            parts,
        })
    }

    fn names(&self) -> Vec<&'static str> {
        let mut names = vec![MOVIES_TOPIC];
        if self.stress.is_some() {
            names.push(STRESS_TOPIC);
        }
        if self.parts.is_some() {
            names.push(PARTS_TOPIC);
        }
        names
    }

    fn source(&self, topic: &str) -> Option<Arc<dyn QuestionSource>> {
        match topic {
            MOVIES_TOPIC => Some(self.movies.clone() as Arc<dyn QuestionSource>),
            STRESS_TOPIC => self.stress.clone().map(|s| s as Arc<dyn QuestionSource>),
            PARTS_TOPIC => self.parts.clone().map(|s| s as Arc<dyn QuestionSource>),
            _ => None,
        }
    }
}

struct App {
    config: Config,
    topics: Topics,
    /// One engine per chat, kept across topics.
    sessions: Mutex<HashMap<ChatId, RoundEngine>>,
    /// Statistics live as long as the process, across topics and rounds.
    stores: Mutex<HashMap<ChatId, Arc<dyn StatisticsStore>>>,
}

impl App {
    async fn store_for(&self, bot: &Bot, chat_id: ChatId) -> Arc<dyn StatisticsStore> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(&chat_id) {
            return store.clone();
        }

        let path = self.config.stats_dir.join(format!("{}.json", chat_id.0));
        let store: Arc<dyn StatisticsStore> = match JsonFileStatistics::open(&path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                log::error!("Statistics for chat {} unavailable: {}", chat_id.0, e);
                let _ = bot
                    .send_message(
                        chat_id,
                        "Не вдалося завантажити статистику. Результати цієї сесії не буде збережено.",
                    )
                    .await;
                Arc::new(MemoryStatistics::new())
            }
        };
        stores.insert(chat_id, store.clone());
        store
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let config = Config::from_env()?;
    let topics = Topics::load(&config)?;
    log::info!("Topics available: {}", topics.names().join(", "));

    let app = Arc::new(App {
        config,
        topics,
        sessions: Mutex::new(HashMap::new()),
        stores: Mutex::new(HashMap::new()),
    });

    let bot = Bot::from_env();

    Dispatcher::builder(bot, Update::filter_message().endpoint(handle_message))
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "Будь ласка, скористайтеся кнопками")
            .await?;
        return Ok(());
    };

    match text {
        "/start" | CHANGE_TOPIC => {
            let greeting = if text == "/start" {
                GREETING_TEXT
            } else {
                "Обери тему"
            };
            bot.send_message(chat_id, greeting)
                .reply_markup(topics_keyboard(&app.topics))
                .await?;
        }
        YES | NO => {
            let sessions = app.sessions.lock().await;
            match sessions.get(&chat_id) {
                // Ignored answers (double taps, taps during the pause) get no reply.
                Some(engine) => {
                    engine.submit_answer(text == YES);
                }
                None => {
                    bot.send_message(chat_id, "Спочатку обери тему")
                        .reply_markup(topics_keyboard(&app.topics))
                        .await?;
                }
            }
        }
        PLAY_AGAIN => {
            let sessions = app.sessions.lock().await;
            if let Some(engine) = sessions.get(&chat_id) {
                if engine.retry() {
                    log::debug!("Chat {} restarted its round", chat_id.0);
                }
            }
        }
        topic => match app.topics.source(topic) {
            Some(source) => start_topic(&bot, chat_id, &app, source).await?,
            None => {
                bot.send_message(chat_id, "Будь ласка, виберіть один з варіантів")
                    .await?;
            }
        },
    }
    Ok(())
}

async fn start_topic(
    bot: &Bot,
    chat_id: ChatId,
    app: &App,
    source: Arc<dyn QuestionSource>,
) -> HandlerResult {
    bot.send_message(chat_id, "Чудово! Почнемо тест!")
        .reply_markup(answer_keyboard())
        .await?;

    let total = app.config.round.questions_per_round;
    let mut sessions = app.sessions.lock().await;
    match sessions.get(&chat_id) {
        // Same engine and delivery queue, so a result still being saved
        // reaches the chat before the new topic's first question.
        Some(engine) => {
            engine.start_round_from(source, total);
        }
        None => {
            let store = app.store_for(bot, chat_id).await;
            let observer = ChatObserver::spawn(bot.clone(), chat_id, app.config.posters_dir.clone());
            let engine = RoundEngine::new(source, store, observer, app.config.round.feedback_delay);
            engine.start_round(total);
            sessions.insert(chat_id, engine);
        }
    }
    Ok(())
}

fn topics_keyboard(topics: &Topics) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![topics
        .names()
        .into_iter()
        .map(KeyboardButton::new)
        .collect::<Vec<_>>()])
}

fn answer_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(NO), KeyboardButton::new(YES)]])
}

fn round_over_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(PLAY_AGAIN),
        KeyboardButton::new(CHANGE_TOPIC),
    ]])
}

enum Outgoing {
    Question {
        question: Question,
        number: usize,
        total: usize,
    },
    Verdict(bool),
    RoundEnded {
        record: RoundRecord,
        summary: Option<Summary>,
        stale: bool,
    },
    SourceError(String),
}

/// Queues engine events for one chat. A single task delivers them so the
/// chat sees them in the order they happened.
struct ChatObserver {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl ChatObserver {
    fn spawn(bot: Bot, chat_id: ChatId, posters_dir: PathBuf) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(deliver(bot, chat_id, posters_dir, rx));
        Arc::new(Self { tx })
    }

    fn send(&self, outgoing: Outgoing) {
        // The delivery task only stops when the engine is gone.
        let _ = self.tx.send(outgoing);
    }
}

impl RoundObserver for ChatObserver {
    fn on_new_question(&self, question: &Question, number: usize, total: usize) {
        self.send(Outgoing::Question {
            question: question.clone(),
            number,
            total,
        });
    }

    fn on_answer_evaluated(&self, is_correct: bool) {
        self.send(Outgoing::Verdict(is_correct));
    }

    fn on_round_ended(&self, record: &RoundRecord, statistics: &RoundStatistics) {
        self.send(Outgoing::RoundEnded {
            record: record.clone(),
            summary: statistics
                .aggregate()
                .map(|aggregate| build_summary(record, aggregate)),
            stale: statistics.is_stale(),
        });
    }

    fn on_source_error(&self, error: &RoundError) {
        self.send(Outgoing::SourceError(error.to_string()));
    }
}

async fn deliver(
    bot: Bot,
    chat_id: ChatId,
    posters_dir: PathBuf,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(outgoing) = rx.recv().await {
        if let Err(e) = deliver_one(&bot, chat_id, &posters_dir, outgoing).await {
            log::warn!("Failed to message chat {}: {}", chat_id.0, e);
        }
    }
}

async fn deliver_one(
    bot: &Bot,
    chat_id: ChatId,
    posters_dir: &std::path::Path,
    outgoing: Outgoing,
) -> HandlerResult {
    match outgoing {
        Outgoing::Question {
            question,
            number,
            total,
        } => {
            let text = format!("Питання {}/{}\n\n{}", number, total, question.text);
            let poster = question
                .media_ref
                .as_ref()
                .map(|media| posters_dir.join(media))
                .filter(|path| path.exists());
            match poster {
                Some(path) => {
                    bot.send_photo(chat_id, InputFile::file(path))
                        .caption(text)
                        .reply_markup(answer_keyboard())
                        .await?;
                }
                None => {
                    bot.send_message(chat_id, text)
                        .reply_markup(answer_keyboard())
                        .await?;
                }
            }
        }
        Outgoing::Verdict(is_correct) => {
            let verdict = if is_correct { "Правильно!" } else { "Неправильно!" };
            bot.send_message(chat_id, verdict).await?;
        }
        Outgoing::RoundEnded {
            record,
            summary,
            stale,
        } => {
            bot.send_message(chat_id, round_ended_text(&record, summary.as_ref(), stale))
                .reply_markup(round_over_keyboard())
                .await?;
        }
        Outgoing::SourceError(error) => {
            bot.send_message(
                chat_id,
                format!("Не вдалося отримати наступне питання.\n{}", error),
            )
            .reply_markup(round_over_keyboard())
            .await?;
        }
    }
    Ok(())
}

fn round_ended_text(record: &RoundRecord, summary: Option<&Summary>, stale: bool) -> String {
    let mut text = match summary {
        Some(summary) => format!(
            "Цей раунд закінчено!\nТвій результат: {}\nКількість зіграних квізів: {}\nРекорд: {}\nСередня точність: {}",
            summary.player_score,
            summary.games_played,
            summary.best_record_display,
            summary.accuracy_display
        ),
        None => format!(
            "Цей раунд закінчено!\nТвій результат: {}/{}",
            record.correct, record.total
        ),
    };
    if stale {
        text.push_str("\n\nНе вдалося зберегти результат, статистика може бути неточною.");
    }
    text
}
