//! Character personas
//!
//! A persona is a chattable character definition: identity, presentation,
//! and the system-prompt template injected as the provider-level
//! instruction. Curated built-ins ship with the binary; user-discovered
//! characters from the external lookup are persisted alongside them.

use crate::error::Result;
use crate::storage::{keys, Storage};
use serde::{Deserialize, Serialize};

/// A chattable character definition
///
/// Immutable after creation; destroyed only when its owning session is
/// explicitly deleted by the user (and even then the record survives so
/// re-opening the same search result reattaches to chat history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Globally unique, stable identifier (e.g. `goku`, `mal_246`)
    pub id: String,
    /// Display name
    pub name: String,
    /// Avatar reference: URL or a short glyph
    pub avatar: String,
    /// Free-text description shown in listings
    pub description: String,
    /// System-prompt template injected as the provider instruction
    pub system_prompt: String,
    /// Display color token
    pub color: String,
    /// True for personas discovered via external search
    #[serde(default)]
    pub is_external: bool,
}

/// Curated built-in personas available on first run
pub fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "goku".to_string(),
            name: "Son Goku".to_string(),
            avatar: "🐉".to_string(),
            description: "Saiyan raised on Earth, always hunting a stronger opponent".to_string(),
            system_prompt: "You are Son Goku from Dragon Ball. You are cheerful, naive, \
                            endlessly hungry, and love fighting strong opponents. Speak \
                            casually and with enthusiasm."
                .to_string(),
            color: "orange".to_string(),
            is_external: false,
        },
        Persona {
            id: "naruto".to_string(),
            name: "Naruto Uzumaki".to_string(),
            avatar: "🍥".to_string(),
            description: "Hyperactive ninja of the Hidden Leaf, future Hokage".to_string(),
            system_prompt: "You are Naruto Uzumaki. You are loud, optimistic, and never go \
                            back on your word. You dream of becoming Hokage and end \
                            sentences with 'dattebayo' when excited."
                .to_string(),
            color: "yellow".to_string(),
            is_external: false,
        },
        Persona {
            id: "sailor_moon".to_string(),
            name: "Sailor Moon".to_string(),
            avatar: "🌙".to_string(),
            description: "Guardian of love and justice".to_string(),
            system_prompt: "You are Usagi Tsukino, Sailor Moon. You are kind-hearted, a \
                            little clumsy, and fiercely protective of your friends. In the \
                            name of the moon, you'll punish wrongdoers."
                .to_string(),
            color: "pink".to_string(),
            is_external: false,
        },
        Persona {
            id: "levi".to_string(),
            name: "Levi Ackerman".to_string(),
            avatar: "⚔️".to_string(),
            description: "Humanity's strongest soldier".to_string(),
            system_prompt: "You are Captain Levi Ackerman from Attack on Titan. You are \
                            blunt, composed, obsessed with cleanliness, and speak in short, \
                            dry sentences."
                .to_string(),
            color: "slate".to_string(),
            is_external: false,
        },
    ]
}

/// Store of known chat targets
///
/// Built-ins are compiled in; custom (typically externally sourced)
/// personas are persisted under the `custom_characters` key. Lookups
/// check both.
#[derive(Clone)]
pub struct PersonaStore {
    storage: Storage,
}

impl PersonaStore {
    /// Create a store over the shared storage handle
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn load_custom(&self) -> Result<Vec<Persona>> {
        Ok(self
            .storage
            .get_json(keys::CUSTOM_CHARACTERS)?
            .unwrap_or_default())
    }

    /// Insert a persona if its identifier is new
    ///
    /// A no-op when the id already exists (built-in or stored), so
    /// re-selecting the same search result can never clobber an existing
    /// record.
    ///
    /// # Examples
    ///
    /// ```
    /// use otakuverse::persona::{Persona, PersonaStore};
    /// use otakuverse::storage::Storage;
    ///
    /// # fn main() -> otakuverse::error::Result<()> {
    /// let store = PersonaStore::new(Storage::in_memory());
    /// let persona = Persona {
    ///     id: "mal_246".to_string(),
    ///     name: "Edward Elric".to_string(),
    ///     avatar: "".to_string(),
    ///     description: "Fullmetal Alchemist".to_string(),
    ///     system_prompt: "You are Edward Elric.".to_string(),
    ///     color: "red".to_string(),
    ///     is_external: true,
    /// };
    /// store.upsert(persona)?;
    /// assert!(store.get("mal_246")?.is_some());
    /// # Ok(())
    /// # }
    /// ```
    pub fn upsert(&self, persona: Persona) -> Result<()> {
        if self.get(&persona.id)?.is_some() {
            tracing::debug!("Persona {} already known, keeping existing record", persona.id);
            return Ok(());
        }

        let mut custom = self.load_custom()?;
        custom.push(persona);
        self.storage.put_json(keys::CUSTOM_CHARACTERS, &custom)
    }

    /// Fetch a persona by identifier
    pub fn get(&self, id: &str) -> Result<Option<Persona>> {
        if let Some(builtin) = builtin_personas().into_iter().find(|p| p.id == id) {
            return Ok(Some(builtin));
        }
        Ok(self.load_custom()?.into_iter().find(|p| p.id == id))
    }

    /// List personas whose name matches a case-insensitive substring
    ///
    /// Externally sourced personas are hidden unless one of the ids in
    /// `session_personas` references them; this keeps the saved list
    /// curated while still surfacing characters the user has actually
    /// chatted with.
    pub fn list(&self, filter: &str, session_personas: &[String]) -> Result<Vec<Persona>> {
        let needle = filter.to_lowercase();
        let mut personas = builtin_personas();
        personas.extend(self.load_custom()?);

        Ok(personas
            .into_iter()
            .filter(|p| !p.is_external || session_personas.iter().any(|id| id == &p.id))
            .filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle))
            .collect())
    }
}
