//! **VotingWorker**: the three-step spoken ballot for one session.
//!
//! ```text
//! AwaitingVoterID ──id──▶ AwaitingCandidate ──1..N──▶ AwaitingConfirmation ──confirm──▶ Completed
//!        │                       │                            └──anything else──▶ Cancelled
//!        └── retries spent ──────┴──▶ Failed
//! ```
//!
//! State-coded voter ids are read back and need a spoken "yes" before the ballot opens; a
//! "no" asks for the id again.
//!
//! The worker is single-threaded: one prompt, one listen, one step at a time. Every step
//! is published through a [`StatusWriter`], which refuses regressions and anything after
//! a terminal event.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use voxvote_core::{
    extract_candidate_number, is_confirmation, yes_or_no, BallotStore, Candidate, SessionId,
    StatusEvent, StatusWriter, Step, VoteConfig, VoteError, VoteReceipt, VoteResult,
    VoterIdScheme, VoterIdentity,
};
use voxvote_voice::{SpeechGateway, VoiceError};

/// Retry bound and listening budget for each step.
#[derive(Debug, Clone)]
pub struct BoothPolicy {
    pub attempts_per_step: u32,
    pub listen_budget: Duration,
}

impl Default for BoothPolicy {
    fn default() -> Self {
        Self {
            attempts_per_step: 3,
            listen_budget: Duration::from_secs(15),
        }
    }
}

impl BoothPolicy {
    pub fn from_config(config: &VoteConfig) -> Self {
        Self {
            attempts_per_step: config.attempts_per_step.max(1),
            listen_budget: config.listen_budget(),
        }
    }
}

/// Yes/no questions per read-back of a state-coded voter id.
const ID_CONFIRM_ATTEMPTS: u32 = 2;

/// Why the conversation stopped early.
enum Halt {
    /// The session reached an outcome (cancelled, or retries spent).
    Outcome(StatusEvent),
    /// Something broke underneath the conversation.
    Fault(VoteError),
}

impl From<VoteError> for Halt {
    fn from(err: VoteError) -> Self {
        Halt::Fault(err)
    }
}

impl From<VoiceError> for Halt {
    fn from(err: VoiceError) -> Self {
        Halt::Fault(err.into())
    }
}

type StepResult<T> = Result<T, Halt>;

/// One listening step as presented to the voter.
struct Question<'a> {
    step: Step,
    /// Status message while listening.
    listening: &'a str,
    /// Spoken before each retry.
    retry_hint: &'a str,
    /// What is being asked for, used in failure reasons.
    subject: &'a str,
}

/// The last miss of a step, which decides the failure kind once retries run out.
enum Miss {
    Silence,
    Rejected(String),
}

pub struct VotingWorker {
    session: SessionId,
    speech: SpeechGateway,
    store: Arc<dyn BallotStore>,
    status: StatusWriter,
    policy: BoothPolicy,
    scheme: VoterIdScheme,
}

impl VotingWorker {
    pub fn new(
        session: SessionId,
        speech: SpeechGateway,
        store: Arc<dyn BallotStore>,
        status: StatusWriter,
    ) -> Self {
        Self {
            session,
            speech,
            store,
            status,
            policy: BoothPolicy::default(),
            scheme: VoterIdScheme::default(),
        }
    }

    pub fn with_policy(mut self, policy: BoothPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_scheme(mut self, scheme: VoterIdScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Run the session to a terminal event and publish it.
    ///
    /// Errors only when the terminal event itself could not be written.
    pub fn run(mut self) -> VoteResult<StatusEvent> {
        info!(target: "voxvote::booth", session = %self.session, "voting session started");
        let terminal = match self.converse() {
            Ok(event) | Err(Halt::Outcome(event)) => event,
            Err(Halt::Fault(err)) => {
                error!(target: "voxvote::booth", session = %self.session, "session fault: {}", err);
                StatusEvent::failed_with(&err)
            }
        };
        self.status.publish(terminal.clone())?;
        info!(
            target: "voxvote::booth",
            session = %self.session,
            step = ?terminal.step,
            "voting session finished: {}",
            terminal.message
        );
        self.farewell(&terminal);
        Ok(terminal)
    }

    fn converse(&mut self) -> StepResult<StatusEvent> {
        self.publish(StatusEvent::progress(
            Step::AwaitingVoterId,
            "LISTENING: say your voter ID",
        ))?;
        let voter = self.identify()?;
        let candidate = self.choose()?;
        self.confirm(&voter, &candidate)
    }

    fn identify(&mut self) -> StepResult<VoterIdentity> {
        self.say("Welcome to the voice voting system.")?;
        self.say(self.scheme.prompt())?;
        let scheme = self.scheme;
        let rounds = self.policy.attempts_per_step.max(1);

        for round in 1..=rounds {
            let voter = self.ask(
                Question {
                    step: Step::AwaitingVoterId,
                    listening: "LISTENING: say your voter ID",
                    retry_hint: scheme.prompt(),
                    subject: "voter ID",
                },
                |heard| scheme.identify(heard),
            )?;
            if scheme == VoterIdScheme::DemoToken {
                self.say(&format!("Voter I D {} accepted.", voter.spoken))?;
                info!(target: "voxvote::booth", session = %self.session, "voter identified");
                return Ok(voter);
            }
            if self.read_back(&voter)? {
                self.say(&format!("Voter I D {} confirmed.", voter.token))?;
                info!(
                    target: "voxvote::booth",
                    session = %self.session,
                    voter = %voter.token,
                    "voter identified"
                );
                return Ok(voter);
            }
            if round < rounds {
                self.say("Okay, we will try entering your voter I D again.")?;
                self.publish(StatusEvent::progress(
                    Step::AwaitingVoterId,
                    format!("LISTENING: say your voter ID (attempt {} of {rounds})", round + 1),
                ))?;
                self.say(scheme.prompt())?;
            }
        }

        let err = VoteError::ValidationRejected(format!(
            "Unable to confirm a voter ID after {rounds} attempts"
        ));
        Err(Halt::Outcome(StatusEvent::failed_with(&err)))
    }

    /// Read a parsed id back and wait for yes or no. Anything but a clear yes is a no.
    fn read_back(&mut self, voter: &VoterIdentity) -> StepResult<bool> {
        let listening = format!("LISTENING: say yes if voter ID {} is correct, or no", voter.token);
        for attempt in 1..=ID_CONFIRM_ATTEMPTS {
            self.publish(StatusEvent::progress(Step::AwaitingVoterId, listening.as_str()))?;
            if attempt == 1 {
                self.say(&format!(
                    "You said {}. This maps to voter I D {}. Is this correct?",
                    voter.spoken, voter.token
                ))?;
                self.say("Say yes to confirm or no to try again.")?;
            } else {
                self.say("Please say yes if this is correct or no if it is wrong.")?;
            }

            let Some(heard) = self.speech.recognize_utterance(self.policy.listen_budget)? else {
                self.say("I did not clearly hear yes or no.")?;
                continue;
            };
            self.publish(StatusEvent::progress(
                Step::AwaitingVoterId,
                format!("Heard: {heard}"),
            ))?;
            self.say(&format!("I heard you say: {heard}"))?;
            match yes_or_no(&heard) {
                Some(answer) => return Ok(answer),
                None => self.say("I need you to say exactly yes or no to confirm your voter I D.")?,
            }
        }
        Ok(false)
    }

    fn choose(&mut self) -> StepResult<Candidate> {
        let candidates = self.store.list_candidates()?;
        if candidates.is_empty() {
            return Err(VoteError::Store("no candidates on the ballot".into()).into());
        }
        let count = candidates.len();
        let listening = format!("LISTENING: say your candidate choice (1 to {count})");
        self.publish(StatusEvent::progress(Step::AwaitingCandidate, listening.as_str()))?;

        self.say("Excellent! Now I will read the list of candidates.")?;
        self.say("Listen carefully to all candidates before making your choice.")?;
        for (position, candidate) in candidates.iter().enumerate() {
            self.say(&format!(
                "Candidate number {} is {}",
                position + 1,
                candidate.name
            ))?;
        }
        self.say("Please say just the number of your chosen candidate.")?;

        let retry_hint = format!("Please say just the number, from 1 to {count}.");
        let position = self.ask(
            Question {
                step: Step::AwaitingCandidate,
                listening: &listening,
                retry_hint: &retry_hint,
                subject: "candidate number",
            },
            |heard| extract_candidate_number(heard, count),
        )?;
        let chosen = candidates[position - 1].clone();
        self.say(&format!("You selected {}.", chosen.name))?;
        Ok(chosen)
    }

    fn confirm(&mut self, voter: &VoterIdentity, candidate: &Candidate) -> StepResult<StatusEvent> {
        let listening = format!(
            "LISTENING: say \"confirm\" to cast your vote for {} or \"cancel\" to abort",
            candidate.name
        );
        self.publish(StatusEvent::progress(
            Step::AwaitingConfirmation,
            listening.as_str(),
        ))?;
        self.say(&format!("You have chosen {}.", candidate.name))?;
        self.say("Say confirm to cast your vote for this candidate, or say cancel to abort.")?;

        let (confirmed, heard) = self.ask(
            Question {
                step: Step::AwaitingConfirmation,
                listening: &listening,
                retry_hint: "Please say confirm to cast your vote, or cancel to abort.",
                subject: "confirmation",
            },
            |heard| Some((is_confirmation(heard), heard.to_string())),
        )?;
        if !confirmed {
            info!(target: "voxvote::booth", session = %self.session, "vote cancelled by voter");
            return Err(Halt::Outcome(StatusEvent::cancelled(format!(
                "Vote cancelled: heard '{heard}' but need 'confirm' to vote"
            ))));
        }

        self.store
            .record_vote(&voter.token, candidate.id, Some(&self.session))?;
        info!(
            target: "voxvote::booth",
            session = %self.session,
            candidate_id = candidate.id,
            "vote recorded"
        );
        Ok(StatusEvent::completed(
            VoteReceipt {
                voter_id: voter.token.clone(),
                candidate_id: candidate.id,
                candidate_name: Some(candidate.name.clone()),
            },
            format!("Vote successfully recorded for {}!", candidate.name),
        ))
    }

    /// Listen until `accept` takes an utterance or the attempts run out.
    fn ask<T>(
        &mut self,
        question: Question<'_>,
        accept: impl Fn(&str) -> Option<T>,
    ) -> StepResult<T> {
        let attempts = self.policy.attempts_per_step.max(1);
        let mut miss = Miss::Silence;

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.publish(StatusEvent::progress(
                    question.step,
                    format!("{} (attempt {attempt} of {attempts})", question.listening),
                ))?;
                self.say("Let's try again.")?;
                self.say(question.retry_hint)?;
            }
            self.say("I am listening.")?;

            let Some(heard) = self.speech.recognize_utterance(self.policy.listen_budget)? else {
                self.say("I did not hear anything.")?;
                miss = Miss::Silence;
                continue;
            };
            self.publish(StatusEvent::progress(
                question.step,
                format!("Heard: {heard}"),
            ))?;
            self.say(&format!("I heard you say: {heard}"))?;

            if let Some(value) = accept(&heard) {
                return Ok(value);
            }
            warn!(
                target: "voxvote::booth",
                session = %self.session,
                step = ?question.step,
                attempt,
                "rejected {}: {}",
                question.subject,
                heard
            );
            self.say(&format!("Sorry, that is not a valid {}.", question.subject))?;
            miss = Miss::Rejected(heard);
        }

        let err = match miss {
            Miss::Silence => VoteError::RecognitionTimeout(format!(
                "No {} heard after {attempts} attempts",
                question.subject
            )),
            Miss::Rejected(heard) => {
                VoteError::ValidationRejected(format!("Invalid {}: heard '{heard}'", question.subject))
            }
        };
        Err(Halt::Outcome(StatusEvent::failed_with(&err)))
    }

    fn publish(&mut self, event: StatusEvent) -> StepResult<()> {
        self.status.publish(event).map_err(Halt::Fault)
    }

    /// Speak a prompt. Only device faults abort the session.
    fn say(&self, text: &str) -> StepResult<()> {
        match self.speech.speak(text) {
            Ok(()) => Ok(()),
            Err(e) if e.is_device_failure() => Err(e.into()),
            Err(e) => {
                warn!(target: "voxvote::booth", "prompt not spoken: {}", e);
                Ok(())
            }
        }
    }

    fn farewell(&self, terminal: &StatusEvent) {
        let lines: &[&str] = match terminal.step {
            Step::Completed => &[
                "Excellent! Your vote has been successfully recorded.",
                "Thank you for voting!",
            ],
            Step::Cancelled => &[
                "Your vote has been cancelled.",
                "Please start again if you want to vote.",
            ],
            _ => &[
                "Sorry, the voting session could not be completed.",
                "Please start a new session and try again.",
            ],
        };
        for line in lines {
            if let Err(e) = self.speech.speak(line) {
                warn!(target: "voxvote::booth", "closing prompt not spoken: {}", e);
                break;
            }
        }
    }
}
