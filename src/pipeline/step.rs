//! Step contract and step identifiers

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::context::PipelineContext;
use super::services::Services;
use crate::envelope::Envelope;
use crate::error::PipelineError;

/// What the executor does after a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Run the next step
    Continue,
    /// Halt and return this response
    Stop(Envelope),
}

/// One unit of work in an operation.
///
/// Failures of external calls are data: a step records them in the response
/// slot and chooses `Continue` or `Stop` itself. `Err` is reserved for
/// pipeline misconfiguration, such as a missing prerequisite slot.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn id(&self) -> StepId;

    async fn run(&self, ctx: &mut PipelineContext, services: &Services) -> Result<StepOutcome, PipelineError>;
}

macro_rules! step_ids {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Declarative step identifiers
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StepId {
            $($variant),+
        }

        impl StepId {
            pub const ALL: &'static [StepId] = &[$(StepId::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(StepId::$variant => $name),+
                }
            }
        }

        impl Serialize for StepId {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl FromStr for StepId {
            type Err = PipelineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(StepId::$variant),)+
                    other => Err(PipelineError::UnknownStep(other.to_string())),
                }
            }
        }
    };
}

step_ids! {
    Receive => "receive",
    ReceiveUpload => "receiveUpload",
    Authenticate => "authenticate",
    AuthSelfTest => "authSelfTest",
    DocExistsOnClient => "docExistsOnClient",
    DocExistsOnPortal => "docExistsOnPortal",
    SetFormObject => "setFormObject",
    ConvertFormToDocument => "convertFormToDocument",
    RenderDocument => "renderDocument",
    SaveToXmlDb => "saveToXmlDb",
    NotifyStatus => "notifyStatus",
    UpdateTitle => "updateTitle",
    LoadXmlForIri => "loadXmlForIri",
    ConvertToDocument => "convertToDocument",
    DeleteDocument => "deleteDocument",
    StoreAttachments => "storeAttachments",
    LoadListing => "loadListing",
    LoadFilteredListing => "loadFilteredListing",
    ConvertToListing => "convertToListing",
    SortListing => "sortListing",
    LoadMetadata => "loadMetadata",
    SaveMetadata => "saveMetadata",
    RefreshTags => "refreshTags",
    ConvertFormToMetaObject => "convertFormToMetaObject",
    RenderMetaObject => "renderMetaObject",
    SaveCustomMeta => "saveCustomMeta",
    Respond => "respond",
}

impl StepId {
    /// Steps that always finish with `Stop(response)`; only these may end
    /// an operation.
    pub fn emits_response(&self) -> bool {
        matches!(self, StepId::Respond | StepId::AuthSelfTest)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for id in StepId::ALL {
            assert_eq!(id.as_str().parse::<StepId>().unwrap(), *id);
        }
        assert!(matches!(
            "convertAknObjectToXml".parse::<StepId>(),
            Err(PipelineError::UnknownStep(_))
        ));
    }

    #[test]
    fn test_serializes_as_name() {
        assert_eq!(
            serde_json::to_value([StepId::LoadXmlForIri, StepId::Respond]).unwrap(),
            serde_json::json!(["loadXmlForIri", "respond"])
        );
    }

    #[test]
    fn test_response_emitters() {
        let emitters: Vec<StepId> = StepId::ALL.iter().copied().filter(StepId::emits_response).collect();
        assert_eq!(emitters, vec![StepId::AuthSelfTest, StepId::Respond]);
    }
}
